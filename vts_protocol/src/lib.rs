use serde::{Deserialize, Serialize};

pub const API_NAME: &str = "VTubeStudioPublicAPI";
pub const API_VERSION: &str = "1.0";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8001";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InjectMode {
    Set,
    Add,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParameterValue {
    pub id: String,
    pub value: f64,
}

/// Requests this plugin sends. Serialized as `messageType` + `data` and
/// flattened into a [`RequestEnvelope`].
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "messageType", content = "data")]
pub enum Request {
    #[serde(rename = "AuthenticationTokenRequest", rename_all = "camelCase")]
    AuthenticationToken {
        plugin_name: String,
        plugin_developer: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        plugin_icon: Option<String>,
    },
    #[serde(rename = "AuthenticationRequest", rename_all = "camelCase")]
    Authentication {
        plugin_name: String,
        plugin_developer: String,
        authentication_token: String,
    },
    #[serde(rename = "ParameterCreationRequest", rename_all = "camelCase")]
    ParameterCreation {
        parameter_name: String,
        explanation: String,
        min: f64,
        max: f64,
        default_value: f64,
    },
    #[serde(rename = "InjectParameterDataRequest", rename_all = "camelCase")]
    InjectParameterData {
        face_found: bool,
        mode: InjectMode,
        parameter_values: Vec<ParameterValue>,
    },
}

impl Request {
    pub fn message_type(&self) -> &'static str {
        match self {
            Request::AuthenticationToken { .. } => "AuthenticationTokenRequest",
            Request::Authentication { .. } => "AuthenticationRequest",
            Request::ParameterCreation { .. } => "ParameterCreationRequest",
            Request::InjectParameterData { .. } => "InjectParameterDataRequest",
        }
    }

    pub fn response_type(&self) -> &'static str {
        match self {
            Request::AuthenticationToken { .. } => "AuthenticationTokenResponse",
            Request::Authentication { .. } => "AuthenticationResponse",
            Request::ParameterCreation { .. } => "ParameterCreationResponse",
            Request::InjectParameterData { .. } => "InjectParameterDataResponse",
        }
    }

    pub fn set_parameter(name: &str, value: f64) -> Self {
        Request::InjectParameterData {
            face_found: false,
            mode: InjectMode::Set,
            parameter_values: vec![ParameterValue {
                id: name.to_string(),
                value,
            }],
        }
    }

    pub fn envelope(&self, request_id: impl Into<String>) -> RequestEnvelope<'_> {
        RequestEnvelope {
            api_name: API_NAME,
            api_version: API_VERSION,
            request_id: request_id.into(),
            request: self,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope<'a> {
    pub api_name: &'static str,
    pub api_version: &'static str,
    #[serde(rename = "requestID")]
    pub request_id: String,
    #[serde(flatten)]
    pub request: &'a Request,
}

/// Raw frame from the remote application. `data` stays untyped until
/// [`ResponseEnvelope::decode`] looks at `messageType`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub api_name: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(rename = "requestID", default)]
    pub request_id: String,
    pub message_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    AuthenticationToken { authentication_token: String },
    Authentication { authenticated: bool, reason: String },
    ParameterCreation { parameter_name: String },
    InjectParameterData,
    ApiError { error_id: i64, message: String },
    Other { message_type: String },
}

impl Response {
    pub fn message_type(&self) -> &str {
        match self {
            Response::AuthenticationToken { .. } => "AuthenticationTokenResponse",
            Response::Authentication { .. } => "AuthenticationResponse",
            Response::ParameterCreation { .. } => "ParameterCreationResponse",
            Response::InjectParameterData => "InjectParameterDataResponse",
            Response::ApiError { .. } => "APIError",
            Response::Other { message_type } => message_type,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationTokenData {
    authentication_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationData {
    authenticated: bool,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterCreationData {
    #[serde(default)]
    parameter_name: String,
}

#[derive(Deserialize)]
struct ApiErrorData {
    #[serde(rename = "errorID")]
    error_id: i64,
    #[serde(default)]
    message: String,
}

impl ResponseEnvelope {
    pub fn decode(self) -> Result<Response, serde_json::Error> {
        let response = match self.message_type.as_str() {
            "AuthenticationTokenResponse" => {
                let d: AuthenticationTokenData = serde_json::from_value(self.data)?;
                Response::AuthenticationToken {
                    authentication_token: d.authentication_token,
                }
            }
            "AuthenticationResponse" => {
                let d: AuthenticationData = serde_json::from_value(self.data)?;
                Response::Authentication {
                    authenticated: d.authenticated,
                    reason: d.reason,
                }
            }
            "ParameterCreationResponse" => {
                let d: ParameterCreationData = serde_json::from_value(self.data)?;
                Response::ParameterCreation {
                    parameter_name: d.parameter_name,
                }
            }
            "InjectParameterDataResponse" => Response::InjectParameterData,
            "APIError" => {
                let d: ApiErrorData = serde_json::from_value(self.data)?;
                Response::ApiError {
                    error_id: d.error_id,
                    message: d.message,
                }
            }
            _ => Response::Other {
                message_type: self.message_type,
            },
        };
        Ok(response)
    }
}
