use crate::config::VnpayConfig;
use crate::domain::invoice::PAYMENT_METHOD_VNPAY;
use crate::error::CallbackError;
use crate::gateways::{CallbackPayload, CheckoutRequest, PaymentProvider};
use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::BTreeMap;

type HmacSha512 = Hmac<Sha512>;

const VERSION: &str = "2.1.0";
const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
const SUCCESS_CODE: &str = "00";
// VNPay amounts carry two implied decimals.
const AMOUNT_SCALE: i64 = 100;

pub struct VnpayGateway {
    pub tmn_code: String,
    pub hash_secret: String,
    pub base_url: String,
    pub return_url: String,
    pub expire_after: Duration,
}

impl VnpayGateway {
    pub fn new(cfg: &VnpayConfig, expire_after: Duration) -> Self {
        Self {
            tmn_code: cfg.tmn_code.clone(),
            hash_secret: cfg.hash_secret.clone(),
            base_url: cfg.base_url.clone(),
            return_url: cfg.return_url.clone(),
            expire_after,
        }
    }

    fn mac(&self) -> Result<HmacSha512> {
        HmacSha512::new_from_slice(self.hash_secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid vnpay secret: {e}"))
    }

    pub fn sign(&self, canonical: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(canonical.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Sorted, form-url-encoded `vnp_*` parameters without the hash fields.
pub fn canonical_query(params: &BTreeMap<String, String>) -> Result<String> {
    let signed: BTreeMap<&str, &str> = params
        .iter()
        .filter(|(k, v)| k.starts_with("vnp_") && *k != SECURE_HASH && *k != SECURE_HASH_TYPE && !v.is_empty())
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    Ok(serde_urlencoded::to_string(signed)?)
}

/// `yyyyMMddHHmmss` in GMT+7, the only timezone VNPay accepts.
fn vn_time(ts: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(7 * 3600) {
        Some(offset) => ts.with_timezone(&offset).format("%Y%m%d%H%M%S").to_string(),
        None => ts.format("%Y%m%d%H%M%S").to_string(),
    }
}

impl PaymentProvider for VnpayGateway {
    fn name(&self) -> &'static str {
        "vnpay"
    }

    fn payment_method(&self) -> &'static str {
        PAYMENT_METHOD_VNPAY
    }

    fn checkout_url(&self, request: &CheckoutRequest, now: DateTime<Utc>) -> Result<String> {
        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VERSION.to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.tmn_code.clone());
        params.insert("vnp_Amount".to_string(), self.provider_amount(request.amount).to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), request.registration_id.to_string());
        params.insert(
            "vnp_OrderInfo".to_string(),
            format!("Payment for registration {}", request.registration_id),
        );
        params.insert("vnp_OrderType".to_string(), "other".to_string());
        params.insert("vnp_Locale".to_string(), "vn".to_string());
        params.insert("vnp_ReturnUrl".to_string(), self.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), request.client_ip.clone());
        params.insert("vnp_CreateDate".to_string(), vn_time(now));
        params.insert("vnp_ExpireDate".to_string(), vn_time(now + self.expire_after));

        let query = canonical_query(&params)?;
        let hash = self.sign(&query)?;
        Ok(format!("{}?{}&{}={}", self.base_url, query, SECURE_HASH, hash))
    }

    fn verify_callback(&self, params: &BTreeMap<String, String>) -> bool {
        let Some(provided) = params.get(SECURE_HASH) else {
            return false;
        };
        let Ok(provided) = hex::decode(provided.trim()) else {
            return false;
        };
        let Ok(query) = canonical_query(params) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(query.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&provided).is_ok()
    }

    fn parse_callback(&self, params: &BTreeMap<String, String>) -> Result<CallbackPayload, CallbackError> {
        let field = |name: &str| -> Result<String, CallbackError> {
            params
                .get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| CallbackError::Malformed(format!("missing {name}")))
        };

        let order_ref = field("vnp_TxnRef")?;
        let provider_amount = field("vnp_Amount")?
            .parse::<i64>()
            .map_err(|_| CallbackError::Malformed("vnp_Amount is not an integer".to_string()))?;
        let response_code = field("vnp_ResponseCode")?;
        let transaction_status = params.get("vnp_TransactionStatus").map(String::as_str);
        let succeeded =
            response_code == SUCCESS_CODE && transaction_status.map_or(true, |s| s == SUCCESS_CODE);

        Ok(CallbackPayload {
            order_ref,
            provider_amount,
            response_code,
            transaction_ref: params.get("vnp_TransactionNo").filter(|v| !v.is_empty()).cloned(),
            bank_code: params.get("vnp_BankCode").filter(|v| !v.is_empty()).cloned(),
            succeeded,
        })
    }

    fn provider_amount(&self, total_price: i64) -> i64 {
        total_price * AMOUNT_SCALE
    }
}
