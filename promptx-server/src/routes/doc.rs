use utoipa::OpenApi;

use crate::routes::{api, health};

#[derive(OpenApi)]
#[openapi(info(
    title = "promptx-server",
    description = "PromptX prompt enhancer API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(api::api_docs());
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_api_path_is_documented() {
        let docs = get_docs();
        for path in [
            "/health",
            "/api/conversation/create",
            "/api/conversation/list",
            "/api/conversation/update-title",
            "/api/message/get",
            "/api/chat",
            "/api/guest/session",
            "/api/me",
            "/api/auth/callback",
            "/api/ask",
            "/api/search",
        ] {
            assert!(docs.paths.paths.contains_key(path), "{path} missing from OpenAPI document");
        }
    }
}
