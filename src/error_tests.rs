use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
    assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
    assert_eq!(AppError::conflict("conflict", "dup").http_status(), 409);
    assert_eq!(AppError::auth("auth", "no").http_status(), 401);
    assert_eq!(AppError::csrf("csrf", "blocked").http_status(), 403);
    assert_eq!(AppError::upstream("scoring_failed", "timeout").http_status(), 502);
    assert_eq!(AppError::io("io", "io").http_status(), 503);
    assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn display_joins_code_and_message() {
    let e = AppError::auth("invalid_credentials", "wrong password");
    assert_eq!(e.to_string(), "invalid_credentials: wrong password");
}

#[test]
fn serializes_with_type_tag() {
    let v = serde_json::to_value(AppError::conflict("email_taken", "exists")).unwrap();
    assert_eq!(v["type"], "conflict");
    assert_eq!(v["code"], "email_taken");
    assert_eq!(v["message"], "exists");
}

#[test]
fn into_response_uses_mapped_status() {
    let resp = AppError::csrf("csrf", "invalid csrf").into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = AppError::upstream("scoring_failed", "down").into_response();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[test]
fn anyhow_maps_to_internal() {
    let e: AppError = anyhow::anyhow!("boom").into();
    assert_eq!(e.http_status(), 500);
    assert_eq!(e.message(), "boom");
}
