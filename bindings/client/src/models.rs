use serde::{Deserialize, Serialize};

/// Every request carries the API credentials next to the endpoint's own fields.
#[derive(Serialize)]
pub(crate) struct ApiRequest<'a, P: Serialize> {
    pub api_key: &'a str,
    pub api_key_secret: &'a str,
    #[serde(flatten)]
    pub payload: P,
}

/// The part of any response that reports a failure.
#[derive(Deserialize, Default)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct GetUserRequest<'a> {
    pub target_user: TargetUser<'a>,
}

#[derive(Serialize)]
pub(crate) struct TargetUser<'a> {
    pub username: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct GetUserResponse {
    pub user: Option<UserBody>,
}

#[derive(Deserialize)]
pub(crate) struct UserBody {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Serialize)]
pub(crate) struct RequestKasmRequest<'a> {
    pub user_id: &'a str,
    pub image_id: &'a str,
    pub enable_sharing: bool,
}

#[derive(Deserialize)]
pub(crate) struct RequestKasmResponse {
    #[serde(default)]
    pub kasm_id: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct KasmRef<'a> {
    pub user_id: &'a str,
    pub kasm_id: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct KasmStatusResponse {
    pub kasm: Option<KasmStatusBody>,
}

#[derive(Deserialize)]
pub(crate) struct KasmStatusBody {
    pub operational_status: String,
    #[serde(default)]
    pub operational_progress: Option<f64>,
    #[serde(default)]
    pub operational_message: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ExecCommandRequest<'a> {
    pub user_id: &'a str,
    pub kasm_id: &'a str,
    pub exec_config: ExecConfig<'a>,
}

#[derive(Serialize)]
pub(crate) struct ExecConfig<'a> {
    pub cmd: &'a str,
}

#[derive(Serialize)]
pub(crate) struct Empty {}

#[derive(Deserialize)]
pub(crate) struct GetImagesResponse {
    #[serde(default)]
    pub images: Vec<Image>,
}

/// An image that sessions can be launched from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Image {
    pub image_id: String,
    #[serde(default)]
    pub friendly_name: String,
}
