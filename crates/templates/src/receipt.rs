use herald_common::types::{Channel, Template};
use serde::Deserialize;

use crate::{BoundTemplate, MessageTemplate, TemplateError, escape_html};

/// Payment receipt sent after an order is charged.
pub struct ReceiptTemplate;

impl ReceiptTemplate {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReceiptTemplate {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters accepted by the receipt template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub order_id: i64,
    pub commission_amount: String,
    pub total_amount: String,
}

impl MessageTemplate for ReceiptTemplate {
    fn template(&self) -> Template {
        Template::Receipt
    }

    fn bind(&self, params: &serde_json::Value) -> Result<Box<dyn BoundTemplate>, TemplateError> {
        let receipt: Receipt =
            serde_json::from_value(params.clone()).map_err(|source| TemplateError::InvalidParams {
                template: Template::Receipt,
                source,
            })?;
        Ok(Box::new(receipt))
    }
}

impl BoundTemplate for Receipt {
    fn render_for(&self, channel: Channel) -> Result<String, TemplateError> {
        let content = match channel {
            Channel::Email => format!(
                "<h3>Receipt</h3>\n\n\
                 <p>Order <b>{}</b> has been paid successfully</p>\n\n\
                 <p>\n    Commission: {} <br/>\n    Total charged: {}\n</p>\n\n\
                 <p>Thank you for your purchase!</p>",
                self.order_id,
                escape_html(&self.commission_amount),
                escape_html(&self.total_amount),
            ),
            Channel::Telegram => format!(
                "<b>Receipt</b>\n\n\
                 Order <code>{}</code> has been paid successfully\n\n\
                 Commission: {}\n\
                 Total charged: {}\n\n\
                 Thank you for your purchase",
                self.order_id,
                escape_html(&self.commission_amount),
                escape_html(&self.total_amount),
            ),
            Channel::Discord => format!(
                "**Receipt**\n\n\
                 Order `{}` has been paid successfully\n\n\
                 Commission: {}\n\
                 Total charged: {}\n\n\
                 Thank you for your purchase",
                self.order_id, self.commission_amount, self.total_amount,
            ),
        };

        Ok(content)
    }
}
