#[derive(Debug, strum::Display, strum::AsRefStr, strum::IntoStaticStr, strum::EnumString)]
#[non_exhaustive]
pub enum GuardSpanKind {
    #[strum(serialize = "graphql.authorize")]
    GraphqlAuthorize,
    #[strum(serialize = "graphql.authorize.query")]
    GraphqlAuthorizeQuery,
    #[strum(serialize = "graphql.authorize.field")]
    GraphqlAuthorizeField,
}
