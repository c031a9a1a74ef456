use actix_web::{http::StatusCode, test, test::TestRequest, web, App, HttpResponse};
use fh_common::Secret;
use razorpay_tools::hmac_sha256_hex;

use crate::middleware::HmacMiddlewareFactory;

const SECRET: &str = "whsec_not_a_real_secret";
const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";
const BODY: &[u8] = br#"{"event":"payment.captured","payload":{}}"#;

/// The body the handler sees must be the same bytes the middleware verified.
async fn echo(body: web::Bytes) -> HttpResponse {
    HttpResponse::Ok().body(body)
}

fn middleware(enabled: bool) -> HmacMiddlewareFactory {
    HmacMiddlewareFactory::new(SIGNATURE_HEADER, Secret::new(SECRET.to_string()), enabled)
}

#[actix_web::test]
async fn valid_signature_is_accepted_and_body_reinjected() {
    let _ = env_logger::try_init().ok();
    let app = App::new().service(web::resource("/hook").wrap(middleware(true)).route(web::post().to(echo)));
    let service = test::init_service(app).await;
    let signature = hmac_sha256_hex(SECRET, BODY);
    let req = TestRequest::post()
        .uri("/hook")
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(BODY)
        .to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = test::read_body(res).await;
    assert_eq!(body.as_ref(), BODY);
}

#[actix_web::test]
async fn missing_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let app = App::new().service(web::resource("/hook").wrap(middleware(true)).route(web::post().to(echo)));
    let service = test::init_service(app).await;
    let req = TestRequest::post().uri("/hook").set_payload(BODY).to_request();
    let err = test::try_call_service(&service, req).await.expect_err("Expected error");
    assert_eq!(err.to_string(), "No HMAC signature found.");
}

#[actix_web::test]
async fn tampered_body_is_rejected() {
    let _ = env_logger::try_init().ok();
    let app = App::new().service(web::resource("/hook").wrap(middleware(true)).route(web::post().to(echo)));
    let service = test::init_service(app).await;
    let signature = hmac_sha256_hex(SECRET, BODY);
    let req = TestRequest::post()
        .uri("/hook")
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(br#"{"event":"payment.captured","payload":{"x":1}}"#.as_slice())
        .to_request();
    let err = test::try_call_service(&service, req).await.expect_err("Expected error");
    assert_eq!(err.to_string(), "Invalid HMAC signature.");
}

#[actix_web::test]
async fn disabled_checks_allow_unsigned_requests() {
    let _ = env_logger::try_init().ok();
    let app = App::new().service(web::resource("/hook").wrap(middleware(false)).route(web::post().to(echo)));
    let service = test::init_service(app).await;
    let req = TestRequest::post().uri("/hook").set_payload(BODY).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
}
