use poem_openapi::Object;

use crate::domain::models::Button;

/// Inline keyboard button, passed to Telegram as-is.
#[derive(Object, Debug, Clone)]
pub struct ButtonDto {
    #[oai(validator(min_length = 1))]
    pub text: String,
    pub url: Option<String>,
    #[oai(rename = "callback_data")]
    pub callback_data: Option<String>,
}

impl From<ButtonDto> for Button {
    fn from(value: ButtonDto) -> Self {
        Button {
            text: value.text,
            url: value.url,
            callback_data: value.callback_data,
        }
    }
}
