use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use cloudevent::{DeliveryResult, Error, ErrorKind};

/// 2xx acknowledges; any other status is a NACK carrying the code.
pub fn delivery_result(status: StatusCode) -> DeliveryResult {
    DeliveryResult::from_status(status.as_u16())
}

/// Status a receiver answers with when it cannot handle an inbound message.
pub fn error_status(err: &Error) -> StatusCode {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::Format => StatusCode::BAD_REQUEST,
        ErrorKind::Encoding => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::Protocol | ErrorKind::Transport => StatusCode::BAD_GATEWAY,
        ErrorKind::Cancellation => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn into_actix_error(err: Error) -> actix_web::Error {
    let status = error_status(&err);
    InternalError::new(err, status).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_results() {
        assert!(delivery_result(StatusCode::ACCEPTED).is_ack());
        assert_eq!(delivery_result(StatusCode::from_u16(425).unwrap()).status(), Some(425));
        assert!(delivery_result(StatusCode::MOVED_PERMANENTLY).is_nack());
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(error_status(&Error::validation("missing id")), StatusCode::BAD_REQUEST);
        assert_eq!(error_status(&Error::decode("bad json")), StatusCode::BAD_REQUEST);
        assert_eq!(error_status(&Error::UnknownEncoding), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let response = into_actix_error(Error::validation("x")).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
