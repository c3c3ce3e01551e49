use chrono::{Duration, Utc};
use event_ticketing::config::VnpayConfig;
use event_ticketing::error::CallbackError;
use event_ticketing::gateways::vnpay::{canonical_query, VnpayGateway};
use event_ticketing::gateways::{CheckoutRequest, PaymentProvider};
use std::collections::BTreeMap;
use uuid::Uuid;

fn gateway(secret: &str) -> VnpayGateway {
    VnpayGateway::new(
        &VnpayConfig {
            tmn_code: "DEMO0001".to_string(),
            hash_secret: secret.to_string(),
            base_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:3000/vnpay_return".to_string(),
        },
        Duration::minutes(15),
    )
}

fn signed_callback(gw: &VnpayGateway, order_ref: &str, amount: i64, code: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("vnp_TmnCode".to_string(), "DEMO0001".to_string());
    params.insert("vnp_TxnRef".to_string(), order_ref.to_string());
    params.insert("vnp_Amount".to_string(), amount.to_string());
    params.insert("vnp_ResponseCode".to_string(), code.to_string());
    params.insert("vnp_TransactionStatus".to_string(), code.to_string());
    params.insert("vnp_TransactionNo".to_string(), "14226112".to_string());
    params.insert("vnp_BankCode".to_string(), "NCB".to_string());
    params.insert("vnp_OrderInfo".to_string(), "Payment for registration".to_string());
    let hash = gw.sign(&canonical_query(&params).unwrap()).unwrap();
    params.insert("vnp_SecureHashType".to_string(), "HmacSHA512".to_string());
    params.insert("vnp_SecureHash".to_string(), hash);
    params
}

#[test]
fn signed_callback_verifies_and_parses() {
    let gw = gateway("SECRET");
    let order_ref = Uuid::new_v4().to_string();
    let params = signed_callback(&gw, &order_ref, 15_000_000, "00");

    assert!(gw.verify_callback(&params));
    let payload = gw.parse_callback(&params).unwrap();
    assert!(payload.succeeded);
    assert_eq!(payload.order_ref, order_ref);
    assert_eq!(payload.provider_amount, gw.provider_amount(150_000));
    assert_eq!(payload.transaction_ref.as_deref(), Some("14226112"));
    assert_eq!(payload.bank_code.as_deref(), Some("NCB"));
}

#[test]
fn uppercase_hash_is_accepted() {
    let gw = gateway("SECRET");
    let mut params = signed_callback(&gw, "ref", 100, "00");
    let upper = params["vnp_SecureHash"].to_uppercase();
    params.insert("vnp_SecureHash".to_string(), upper);
    assert!(gw.verify_callback(&params));
}

#[test]
fn tampered_amount_fails_verification() {
    let gw = gateway("SECRET");
    let mut params = signed_callback(&gw, "ref", 15_000_000, "00");
    params.insert("vnp_Amount".to_string(), "100".to_string());
    assert!(!gw.verify_callback(&params));
}

#[test]
fn wrong_secret_fails_verification() {
    let params = signed_callback(&gateway("SECRET"), "ref", 100, "00");
    assert!(!gateway("OTHER").verify_callback(&params));
}

#[test]
fn missing_hash_fails_verification() {
    let gw = gateway("SECRET");
    let mut params = signed_callback(&gw, "ref", 100, "00");
    params.remove("vnp_SecureHash");
    assert!(!gw.verify_callback(&params));
}

#[test]
fn non_zero_response_code_is_a_provider_failure() {
    let gw = gateway("SECRET");
    let params = signed_callback(&gw, "ref", 100, "24");
    assert!(gw.verify_callback(&params));
    assert!(!gw.parse_callback(&params).unwrap().succeeded);
}

#[test]
fn non_numeric_amount_is_malformed() {
    let gw = gateway("SECRET");
    let params = signed_callback(&gw, "ref", 100, "00");
    let mut params = params;
    params.insert("vnp_Amount".to_string(), "ten".to_string());
    assert!(matches!(gw.parse_callback(&params), Err(CallbackError::Malformed(_))));
}

#[test]
fn checkout_url_carries_a_verifiable_signature() {
    let gw = gateway("SECRET");
    let registration_id = Uuid::new_v4();
    let url = gw
        .checkout_url(
            &CheckoutRequest {
                registration_id,
                amount: 250_000,
                client_ip: "203.0.113.7".to_string(),
            },
            Utc::now(),
        )
        .unwrap();

    let (base, query) = url.split_once('?').unwrap();
    assert_eq!(base, gw.base_url);
    let params: BTreeMap<String, String> = serde_urlencoded::from_str(query).unwrap();
    assert_eq!(params["vnp_Amount"], "25000000");
    assert_eq!(params["vnp_TxnRef"], registration_id.to_string());
    assert_eq!(params["vnp_IpAddr"], "203.0.113.7");
    assert!(gw.verify_callback(&params));
}
