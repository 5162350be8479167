
mod private_fields;
mod query_gate;
