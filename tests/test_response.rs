use lodge::http::response::{Response, ResponseBuilder, StatusCode};
use lodge::http::writer::serialize_response;

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::Unauthorized.as_u16(), 401);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::Unauthorized.reason_phrase(), "Unauthorized");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    assert_eq!(
        StatusCode::InternalServerError.reason_phrase(),
        "Internal Server Error"
    );
}

#[test]
fn test_response_builder_keeps_header_order() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .header("X-Custom", "value")
        .body(b"test".to_vec())
        .build();

    let names: Vec<&str> = response.headers.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(names, vec!["Content-Type", "X-Custom", "Content-Length"]);
}

#[test]
fn test_response_builder_auto_content_length() {
    let body = b"This is the body".to_vec();
    let response = ResponseBuilder::new(StatusCode::Ok).body(body.clone()).build();

    assert_eq!(response.header("Content-Length"), Some("16"));
}

#[test]
fn test_response_builder_overrides_custom_content_length() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Length", "999")
        .body(b"test".to_vec())
        .build();

    assert_eq!(response.header("content-length"), Some("4"));
    assert_eq!(response.headers.len(), 1);
}

#[test]
fn test_response_builder_replaces_header_in_place() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Cache-Control", "no-cache")
        .header("Pragma", "no-cache")
        .header("cache-control", "max-age=10")
        .build();

    assert_eq!(response.headers[0], ("Cache-Control".to_string(), "max-age=10".to_string()));
}

#[test]
fn test_response_builder_empty_body() {
    let response = ResponseBuilder::new(StatusCode::Ok).build();

    assert!(response.body.is_empty());
    assert_eq!(response.header("Content-Length"), Some("0"));
}

#[test]
fn test_header_bytes_have_no_status_line_or_blank_line() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("A", "1")
        .header("B", "2")
        .body("xy")
        .build();

    assert_eq!(response.header_bytes(), b"A: 1\r\nB: 2\r\nContent-Length: 2".to_vec());
}

#[test]
fn test_not_found_is_canonical() {
    let response = Response::not_found();

    assert_eq!(response.status, StatusCode::NotFound);
    assert_eq!(response.body, b"404 Not Found".to_vec());
    assert_eq!(response.header("Content-Length"), Some("13"));
    assert_eq!(response.header("Cache-Control"), Some("max-age=86000"));
    assert_eq!(response.header("Connection"), Some("close"));
}

#[test]
fn test_serialize_ok_response() {
    let bytes = serialize_response(&Response::ok("hi"));
    assert_eq!(bytes, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi".to_vec());
}

#[test]
fn test_serialize_401_status_line() {
    let response = ResponseBuilder::new(StatusCode::Unauthorized).build();
    let text = String::from_utf8(serialize_response(&response)).unwrap();

    assert!(text.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
    assert!(text.ends_with("\r\n\r\n"));
}
