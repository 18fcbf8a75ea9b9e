use crate::{error::JobError, media::MediaFormat, pending::RequestId};
use twilight_model::channel::message::{
    component::{ActionRow, Button, ButtonStyle},
    Component,
};

const SEPARATOR: char = '|';

/// The payload carried by a format button: `"<tag>|<request id>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatChoice {
    pub format: MediaFormat,
    pub request_id: RequestId,
}

impl FormatChoice {
    pub fn new(format: MediaFormat, request_id: RequestId) -> Self {
        Self { format, request_id }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{SEPARATOR}{}",
            self.format.tag(),
            self.request_id.as_str()
        )
    }

    pub fn parse(custom_id: &str) -> Result<Self, JobError> {
        let malformed = || JobError::MalformedChoice(custom_id.to_string());

        let (tag, id) = custom_id.split_once(SEPARATOR).ok_or_else(malformed)?;
        let format = tag.parse::<MediaFormat>().map_err(|_| malformed())?;
        if id.is_empty() || id.contains(SEPARATOR) {
            return Err(malformed());
        }

        Ok(Self::new(format, RequestId::from(id)))
    }
}

/// One action row with a button per format, all pointing at `request_id`.
pub fn format_buttons(request_id: &RequestId) -> Vec<Component> {
    let buttons = MediaFormat::ALL
        .into_iter()
        .map(|format| {
            Component::Button(Button {
                id: None,
                custom_id: Some(FormatChoice::new(format, request_id.clone()).encode()),
                disabled: false,
                emoji: None,
                label: Some(format.button_label().to_string()),
                style: ButtonStyle::Primary,
                url: None,
                sku_id: None,
            })
        })
        .collect();

    vec![Component::ActionRow(ActionRow {
        id: None,
        components: buttons,
    })]
}
