//! x402 version 1 wire types.
//!
//! V1 names networks by slug (`"arbitrum-sepolia"`) rather than CAIP-2 ids.
//!
//! # Key Types
//!
//! - [`X402Version1`] - Version marker that serializes as `1`
//! - [`PaymentPayload`] - The signed proof a client sends in `X-Payment`
//! - [`PaymentRequirements`] - One acceptable way to pay, set by the server
//! - [`PaymentRequired`] - The `402` response body

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;

/// Version marker for x402 protocol version 1.
pub type X402Version1 = super::Version<1>;

/// Convenience constant for constructing V1 protocol messages.
pub const V1: X402Version1 = super::Version;

/// A signed payment proof.
///
/// # Type Parameters
///
/// - `TScheme` - The scheme identifier type (default: `String`)
/// - `TPayload` - The scheme-specific payload type (default: untyped JSON)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TScheme = String, TPayload = serde_json::Value> {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The payment scheme (e.g., "exact").
    pub scheme: TScheme,
    /// The network name (e.g., "arbitrum-sepolia").
    pub network: String,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
}

/// Payment terms for a single request.
///
/// # Type Parameters
///
/// - `TScheme` - The scheme identifier type (default: `String`)
/// - `TAmount` - The amount type (default: `String`)
/// - `TAddress` - The address type (default: `String`)
/// - `TExtra` - Scheme-specific extra data type (default: `serde_json::Value`)
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements<
    TScheme = String,
    TAmount = String,
    TAddress = String,
    TExtra = serde_json::Value,
> {
    /// The payment scheme (e.g., "exact").
    pub scheme: TScheme,
    /// The network name (e.g., "arbitrum-sepolia").
    pub network: String,
    /// Price of this request in atomic token units.
    pub max_amount_required: TAmount,
    /// Path of the resource being paid for.
    pub resource: String,
    /// Human-readable description of the charge.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// JSON schema for the resource output. Always `null` on this service.
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    /// The recipient address for payment.
    pub pay_to: TAddress,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token contract address.
    pub asset: TAddress,
    /// Scheme-specific extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<TExtra>,
}

impl PaymentRequirements {
    /// Converts the payment requirements to a concrete type.
    ///
    /// Returns `None` if any of the type conversions fail. A present but
    /// unparsable `extra` also yields `None` rather than being dropped.
    #[must_use]
    pub fn as_concrete<
        TScheme: FromStr,
        TAmount: FromStr,
        TAddress: FromStr,
        TExtra: DeserializeOwned,
    >(
        &self,
    ) -> Option<PaymentRequirements<TScheme, TAmount, TAddress, TExtra>> {
        let scheme = self.scheme.parse::<TScheme>().ok()?;
        let max_amount_required = self.max_amount_required.parse::<TAmount>().ok()?;
        let pay_to = self.pay_to.parse::<TAddress>().ok()?;
        let asset = self.asset.parse::<TAddress>().ok()?;
        let extra = match &self.extra {
            Some(v) => Some(serde_json::from_value(v.clone()).ok()?),
            None => None,
        };
        Some(PaymentRequirements {
            scheme,
            network: self.network.clone(),
            max_amount_required,
            resource: self.resource.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            output_schema: self.output_schema.clone(),
            pay_to,
            max_timeout_seconds: self.max_timeout_seconds,
            asset,
            extra,
        })
    }
}

/// Where the facilitator serving this resource can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilitatorInfo {
    /// Facilitator base URL.
    pub url: Url,
}

/// HTTP 402 Payment Required response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// Why payment is being requested, or why the last proof was refused.
    #[serde(default)]
    pub error: String,
    /// List of acceptable payment methods.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Facilitator advertised to clients, if one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator: Option<FacilitatorInfo>,
}
