//! Collaborators behind the HTTP handlers: the completion gateway, OAuth
//! exchange, prompts and the static site knowledge used by `/ask`.

pub mod completion;
pub mod oauth;
pub mod prompts;
pub mod retrieval;
pub mod site_knowledge;
