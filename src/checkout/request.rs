//! Payment window request data.
//!
//! Passive data carried from the host app to the payment window as an
//! `application/x-www-form-urlencoded` POST body. Field order in the body is
//! sorted by key so the same request always renders the same bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::form_urlencoded;

use crate::config::SessionConfig;

/// Version reported to the payment window.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Content type of the POST body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Every key the request itself may render. Custom options never use these.
pub const RESERVED_FIELDS: [&str; 18] = [
    "MAC",
    "amount",
    "callbackurl",
    "calcfee",
    "cancelurl",
    "currency",
    "custom_theme",
    "lang",
    "merchant",
    "orderid",
    "paytype",
    "preauth",
    "test",
    "theme",
    "ticket",
    "timeout",
    "uniqueoid",
    "version",
];

/// Keys excluded from the MAC message.
const MAC_EXCLUDED: [&str; 3] = ["MAC", "custom_theme", "version"];

/// Payment types accepted by the payment window.
pub const PAYMENT_TYPES: [&str; 9] = ["DK", "V-DK", "VISA", "ELEC", "MC", "MTRO", "AMEX", "DIN", "JCB"];

/// Languages the payment window can be shown in.
pub const DEFAULT_LANGUAGES: [&str; 9] = ["da", "en", "sv", "nb", "de", "fi", "fr", "es", "nl"];

/// Invalid request data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("unknown payment type '{0}'")]
    UnknownPaymentType(String),

    #[error("custom option '{0}' collides with a reserved field")]
    ReservedOption(String),

    #[error("custom theme could not be encoded: {0}")]
    Theme(String),
}

/// Payment window layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Default,
    IphoneDibs,
    IphoneNative,
    AndroidDibs,
    AndroidNative,
    /// Colours taken from `PaymentRequest::custom_theme`.
    Custom,
}

impl Theme {
    fn as_param(self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::IphoneDibs => "iphone_dibs",
            Theme::IphoneNative => "iphone_native",
            Theme::AndroidDibs => "android_dibs",
            Theme::AndroidNative => "android_native",
            Theme::Custom => "custom",
        }
    }
}

/// Colours for `Theme::Custom`, sent as a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTheme {
    #[serde(rename = "appBgColor")]
    pub app_bg_color: String,
    #[serde(rename = "paybuttonBgColor")]
    pub paybutton_bg_color: String,
    #[serde(rename = "paybuttonFontColor")]
    pub paybutton_font_color: String,
}

/// The payment flow and its flow-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum PaymentFlow {
    /// Pay with a card.
    Purchase {
        order_id: String,
        /// Smallest currency unit.
        amount: u64,
        pay_types: Vec<String>,
        calc_fee: bool,
    },
    /// Pre-authorize a card for later ticket purchases.
    PreAuthorization { order_id: String, pay_types: Vec<String> },
    /// Pay now and keep the card pre-authorized.
    PreAuthPurchase {
        order_id: String,
        amount: u64,
        pay_types: Vec<String>,
        calc_fee: bool,
    },
    /// Pay with a ticket from an earlier pre-authorization.
    TicketPurchase {
        order_id: String,
        amount: u64,
        ticket_id: String,
    },
}

impl PaymentFlow {
    pub fn order_id(&self) -> &str {
        match self {
            PaymentFlow::Purchase { order_id, .. }
            | PaymentFlow::PreAuthorization { order_id, .. }
            | PaymentFlow::PreAuthPurchase { order_id, .. }
            | PaymentFlow::TicketPurchase { order_id, .. } => order_id,
        }
    }

    fn fields(&self, out: &mut BTreeMap<String, String>) {
        match self {
            PaymentFlow::Purchase {
                order_id,
                amount,
                pay_types,
                calc_fee,
            } => {
                out.insert("orderid".into(), order_id.clone());
                out.insert("amount".into(), amount.to_string());
                out.insert("paytype".into(), pay_types.join(","));
                if *calc_fee {
                    out.insert("calcfee".into(), "1".into());
                }
            }
            PaymentFlow::PreAuthorization { order_id, pay_types } => {
                out.insert("orderid".into(), order_id.clone());
                out.insert("paytype".into(), pay_types.join(","));
                out.insert("preauth".into(), "true".into());
            }
            PaymentFlow::PreAuthPurchase {
                order_id,
                amount,
                pay_types,
                calc_fee,
            } => {
                out.insert("orderid".into(), order_id.clone());
                out.insert("amount".into(), amount.to_string());
                out.insert("paytype".into(), pay_types.join(","));
                out.insert("preauth".into(), "true".into());
                if *calc_fee {
                    out.insert("calcfee".into(), "1".into());
                }
            }
            PaymentFlow::TicketPurchase {
                order_id,
                amount,
                ticket_id,
            } => {
                out.insert("orderid".into(), order_id.clone());
                out.insert("amount".into(), amount.to_string());
                out.insert("ticket".into(), ticket_id.clone());
            }
        }
    }

    fn validate(&self) -> Result<(), RequestError> {
        if self.order_id().trim().is_empty() {
            return Err(RequestError::MissingField("order_id"));
        }
        match self {
            PaymentFlow::Purchase { amount, pay_types, .. }
            | PaymentFlow::PreAuthPurchase { amount, pay_types, .. } => {
                if *amount == 0 {
                    return Err(RequestError::ZeroAmount);
                }
                validate_pay_types(pay_types)
            }
            PaymentFlow::PreAuthorization { pay_types, .. } => validate_pay_types(pay_types),
            PaymentFlow::TicketPurchase { amount, ticket_id, .. } => {
                if *amount == 0 {
                    return Err(RequestError::ZeroAmount);
                }
                if ticket_id.trim().is_empty() {
                    return Err(RequestError::MissingField("ticket_id"));
                }
                Ok(())
            }
        }
    }
}

fn validate_pay_types(pay_types: &[String]) -> Result<(), RequestError> {
    if pay_types.is_empty() {
        return Err(RequestError::MissingField("pay_types"));
    }
    match pay_types.iter().find(|t| !PAYMENT_TYPES.contains(&t.as_str())) {
        Some(unknown) => Err(RequestError::UnknownPaymentType(unknown.clone())),
        None => Ok(()),
    }
}

/// Everything the payment window needs to present a payment form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub merchant_id: String,
    pub currency_code: String,
    pub flow: PaymentFlow,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub custom_theme: Option<CustomTheme>,
    /// Seconds before the window shows its own timeout message.
    #[serde(default)]
    pub timeout_secs: Option<u32>,
    #[serde(default)]
    pub language: Option<String>,
    /// Server-to-server callback once the payment is processed.
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Loaded by the window when the payment is cancelled.
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub test: bool,
    #[serde(default)]
    pub unique_order_id: bool,
    /// MAC computed by the host over `mac_message()`.
    #[serde(default)]
    pub calculated_mac: Option<String>,
    #[serde(default)]
    pub custom_options: BTreeMap<String, String>,
}

impl PaymentRequest {
    /// Request with default presentation options.
    pub fn new(merchant_id: impl Into<String>, currency_code: impl Into<String>, flow: PaymentFlow) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            currency_code: currency_code.into(),
            flow,
            theme: Theme::Default,
            custom_theme: None,
            timeout_secs: None,
            language: None,
            callback_url: None,
            cancel_url: None,
            test: false,
            unique_order_id: false,
            calculated_mac: None,
            custom_options: BTreeMap::new(),
        }
    }

    /// Card payment.
    pub fn purchase(
        merchant_id: impl Into<String>,
        order_id: impl Into<String>,
        amount: u64,
        currency_code: impl Into<String>,
        pay_types: &[&str],
    ) -> Self {
        Self::new(
            merchant_id,
            currency_code,
            PaymentFlow::Purchase {
                order_id: order_id.into(),
                amount,
                pay_types: pay_types.iter().map(|t| t.to_string()).collect(),
                calc_fee: false,
            },
        )
    }

    /// Card pre-authorization for later ticket purchases.
    pub fn pre_authorization(
        merchant_id: impl Into<String>,
        order_id: impl Into<String>,
        currency_code: impl Into<String>,
        pay_types: &[&str],
    ) -> Self {
        Self::new(
            merchant_id,
            currency_code,
            PaymentFlow::PreAuthorization {
                order_id: order_id.into(),
                pay_types: pay_types.iter().map(|t| t.to_string()).collect(),
            },
        )
    }

    /// Purchase paid with a pre-authorized ticket.
    pub fn ticket_purchase(
        merchant_id: impl Into<String>,
        order_id: impl Into<String>,
        amount: u64,
        currency_code: impl Into<String>,
        ticket_id: impl Into<String>,
    ) -> Self {
        Self::new(
            merchant_id,
            currency_code,
            PaymentFlow::TicketPurchase {
                order_id: order_id.into(),
                amount,
                ticket_id: ticket_id.into(),
            },
        )
    }

    /// Use `Theme::Custom` with the given colours.
    pub fn with_custom_theme(mut self, theme: CustomTheme) -> Self {
        self.theme = Theme::Custom;
        self.custom_theme = Some(theme);
        self
    }

    pub fn with_cancel_url(mut self, cancel_url: impl Into<String>) -> Self {
        self.cancel_url = Some(cancel_url.into());
        self
    }

    pub fn with_custom_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_options.insert(key.into(), value.into());
        self
    }

    /// Fill unset presentation options from session settings.
    pub fn apply_defaults(&mut self, session: &SessionConfig) {
        if self.language.is_none() {
            self.language = Some(session.language.clone());
        }
        if self.timeout_secs.is_none() {
            self.timeout_secs = Some(session.window_timeout_secs);
        }
        self.test |= session.test;
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.merchant_id.trim().is_empty() {
            return Err(RequestError::MissingField("merchant_id"));
        }
        if self.currency_code.trim().is_empty() {
            return Err(RequestError::MissingField("currency_code"));
        }
        self.flow.validate()?;

        if let Some(key) = self
            .custom_options
            .keys()
            .find(|k| RESERVED_FIELDS.contains(&k.as_str()))
        {
            return Err(RequestError::ReservedOption(key.clone()));
        }
        Ok(())
    }

    /// All form fields, sorted by key.
    pub fn form_fields(&self) -> Result<BTreeMap<String, String>, RequestError> {
        let mut fields = self.base_fields()?;
        for (key, value) in &self.custom_options {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                return Err(RequestError::ReservedOption(key.clone()));
            }
            fields.insert(key.clone(), value.clone());
        }
        Ok(fields)
    }

    fn base_fields(&self) -> Result<BTreeMap<String, String>, RequestError> {
        let mut fields = BTreeMap::new();
        fields.insert("merchant".to_string(), self.merchant_id.clone());
        fields.insert("currency".to_string(), self.currency_code.clone());
        fields.insert("version".to_string(), LIBRARY_VERSION.to_string());
        fields.insert("theme".to_string(), self.theme.as_param().to_string());
        self.flow.fields(&mut fields);

        if let (Theme::Custom, Some(custom)) = (self.theme, &self.custom_theme) {
            let json = serde_json::to_string(custom).map_err(|e| RequestError::Theme(e.to_string()))?;
            fields.insert("custom_theme".to_string(), json);
        }
        if let Some(timeout) = self.timeout_secs {
            fields.insert("timeout".to_string(), timeout.to_string());
        }
        if let Some(language) = &self.language {
            fields.insert("lang".to_string(), language.clone());
        }
        if let Some(callback_url) = &self.callback_url {
            fields.insert("callbackurl".to_string(), callback_url.clone());
        }
        if let Some(cancel_url) = &self.cancel_url {
            fields.insert("cancelurl".to_string(), cancel_url.clone());
        }
        if self.test {
            fields.insert("test".to_string(), "1".to_string());
        }
        if self.unique_order_id {
            fields.insert("uniqueoid".to_string(), "1".to_string());
        }
        if let Some(mac) = &self.calculated_mac {
            fields.insert("MAC".to_string(), mac.clone());
        }
        Ok(fields)
    }

    /// The POST body for the payment window.
    pub fn post_data(&self) -> Result<String, RequestError> {
        Ok(encode(self.form_fields()?.iter()))
    }

    /// Canonical message a host signs to produce `calculated_mac`.
    pub fn mac_message(&self) -> Result<String, RequestError> {
        let fields = self.form_fields()?;
        Ok(encode(
            fields
                .iter()
                .filter(|(key, _)| !MAC_EXCLUDED.contains(&key.as_str())),
        ))
    }
}

fn encode<'a>(pairs: impl Iterator<Item = (&'a String, &'a String)>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase() -> PaymentRequest {
        PaymentRequest::purchase("90057323", "order-17", 2500, "DKK", &["VISA", "MC"])
    }

    #[test]
    fn test_purchase_post_data_is_sorted() {
        let body = purchase().post_data().unwrap();
        assert_eq!(
            body,
            format!(
                "amount=2500&currency=DKK&merchant=90057323&orderid=order-17&paytype=VISA%2CMC&theme=default&version={}",
                LIBRARY_VERSION
            )
        );
    }

    #[test]
    fn test_custom_theme_is_json() {
        let request = purchase().with_custom_theme(CustomTheme {
            app_bg_color: "#BABA21".into(),
            paybutton_bg_color: "#000000".into(),
            paybutton_font_color: "#FFFFFF".into(),
        });
        let fields = request.form_fields().unwrap();
        assert_eq!(fields["theme"], "custom");
        assert_eq!(
            fields["custom_theme"],
            r##"{"appBgColor":"#BABA21","paybuttonBgColor":"#000000","paybuttonFontColor":"#FFFFFF"}"##
        );
    }

    #[test]
    fn test_mac_message_excludes_presentation_fields() {
        let mut request = purchase().with_custom_theme(CustomTheme {
            app_bg_color: "#111111".into(),
            paybutton_bg_color: "#222222".into(),
            paybutton_font_color: "#333333".into(),
        });
        let unsigned = request.mac_message().unwrap();
        request.calculated_mac = Some("abc123".into());

        let message = request.mac_message().unwrap();
        assert_eq!(message, unsigned);
        assert!(!message.contains("version="));
        assert!(!message.contains("custom_theme="));
        assert!(request.post_data().unwrap().contains("MAC=abc123"));
    }

    #[test]
    fn test_flow_specific_fields() {
        let pre = PaymentRequest::pre_authorization("m", "o", "DKK", &["DK"]);
        let fields = pre.form_fields().unwrap();
        assert_eq!(fields["preauth"], "true");
        assert!(!fields.contains_key("amount"));

        let ticket = PaymentRequest::ticket_purchase("m", "o", 1200, "DKK", "ticket-9");
        let fields = ticket.form_fields().unwrap();
        assert_eq!(fields["ticket"], "ticket-9");
        assert_eq!(fields["amount"], "1200");
        assert!(!fields.contains_key("paytype"));
    }

    #[test]
    fn test_validation() {
        assert!(purchase().validate().is_ok());

        let mut request = purchase();
        request.merchant_id.clear();
        assert_eq!(request.validate(), Err(RequestError::MissingField("merchant_id")));

        let request = PaymentRequest::purchase("m", "o", 0, "DKK", &["VISA"]);
        assert_eq!(request.validate(), Err(RequestError::ZeroAmount));

        let request = PaymentRequest::purchase("m", "o", 10, "DKK", &["BITCOIN"]);
        assert_eq!(
            request.validate(),
            Err(RequestError::UnknownPaymentType("BITCOIN".into()))
        );

        let request = PaymentRequest::ticket_purchase("m", "o", 10, "DKK", " ");
        assert_eq!(request.validate(), Err(RequestError::MissingField("ticket_id")));
    }

    #[test]
    fn test_custom_options_cannot_shadow_fields() {
        let request = purchase().with_custom_option("amount", "1");
        assert_eq!(request.validate(), Err(RequestError::ReservedOption("amount".into())));

        let request = purchase().with_custom_option("s_source", "app");
        assert!(request.validate().is_ok());
        assert!(request.post_data().unwrap().contains("s_source=app"));
    }

    #[test]
    fn test_custom_options_cannot_use_unset_field_names() {
        for key in ["cancelurl", "lang", "MAC", "callbackurl"] {
            let request = purchase().with_custom_option(key, "x");
            assert_eq!(request.validate(), Err(RequestError::ReservedOption(key.into())));
        }
    }

    #[test]
    fn test_reserved_fields_cover_every_rendered_key() {
        let mut request = purchase().with_custom_theme(CustomTheme {
            app_bg_color: "#111111".into(),
            paybutton_bg_color: "#222222".into(),
            paybutton_font_color: "#333333".into(),
        });
        request.flow = PaymentFlow::PreAuthPurchase {
            order_id: "o".into(),
            amount: 10,
            pay_types: vec!["VISA".into()],
            calc_fee: true,
        };
        request.timeout_secs = Some(900);
        request.language = Some("da".into());
        request.callback_url = Some("https://shop.example/cb".into());
        request.cancel_url = Some("https://shop.example/cancel".into());
        request.test = true;
        request.unique_order_id = true;
        request.calculated_mac = Some("abc".into());

        let mut keys: Vec<String> = request.form_fields().unwrap().into_keys().collect();
        keys.extend(
            PaymentRequest::ticket_purchase("m", "o", 1, "DKK", "t")
                .form_fields()
                .unwrap()
                .into_keys(),
        );
        for key in keys {
            assert!(RESERVED_FIELDS.contains(&key.as_str()), "{key} is not reserved");
        }
    }

    #[test]
    fn test_apply_defaults() {
        let mut request = purchase();
        request.language = Some("da".into());
        let session = SessionConfig {
            test: true,
            ..SessionConfig::default()
        };
        request.apply_defaults(&session);

        assert_eq!(request.language.as_deref(), Some("da"));
        assert_eq!(request.timeout_secs, Some(session.window_timeout_secs));
        assert!(request.test);
    }
}
