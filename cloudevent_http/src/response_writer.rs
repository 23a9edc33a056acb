use actix_web::http::header::CONTENT_TYPE;
use actix_web::HttpResponse;
use cloudevent::binding::write_into;
use cloudevent::format::{JsonFormat, JSON_BATCH_MEDIA_TYPE};
use cloudevent::{Context, Encoding, Event, EventMessage, Transformers};
use tracing::debug;

use crate::status::into_actix_error;
use crate::writer::HeaderWriter;

/// Context that answers in the encoding the request arrived in.
pub fn reply_context(request_encoding: Encoding) -> Context {
    match request_encoding {
        Encoding::Structured => Context::new().with_force_structured(),
        _ => Context::new().with_force_binary(),
    }
}

/// `200` carrying `reply`, or `202 Accepted` with an empty body when there
/// is nothing to send back.
pub fn write_cloud_event(
    ctx: &Context,
    reply: Option<Event>,
    transformers: &Transformers,
) -> Result<HttpResponse, actix_web::Error> {
    let Some(event) = reply else {
        return Ok(HttpResponse::Accepted().finish());
    };
    let mut message = EventMessage::new(event);
    let (writer, encoding) =
        write_into(ctx, &mut message, HeaderWriter::new(), transformers).map_err(into_actix_error)?;
    debug!(%encoding, "writing reply event");
    let (headers, body) = writer.into_parts();
    let mut builder = HttpResponse::Ok();
    for (name, value) in headers.iter() {
        builder.append_header((name.clone(), value.clone()));
    }
    Ok(builder.body(body))
}

pub fn write_batch(events: &[Event]) -> Result<HttpResponse, actix_web::Error> {
    if events.is_empty() {
        return Ok(HttpResponse::Accepted().finish());
    }
    let body = JsonFormat.marshal_batch(events).map_err(into_actix_error)?;
    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, JSON_BATCH_MEDIA_TYPE))
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;
    use cloudevent::format::JSON_MEDIA_TYPE;

    fn event() -> Event {
        Event::builder()
            .id("1")
            .source("/s")
            .ty("t")
            .data("text/plain", "hello")
            .build()
            .unwrap()
    }

    fn header(response: &HttpResponse, name: &str) -> Option<String> {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[actix_rt::test]
    async fn no_reply_is_accepted() {
        let response = write_cloud_event(&Context::new(), None, &Transformers::new()).unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[actix_rt::test]
    async fn binary_reply() {
        let ctx = reply_context(Encoding::Binary);
        let response = write_cloud_event(&ctx, Some(event()), &Transformers::new()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "ce-id").as_deref(), Some("1"));
        assert_eq!(header(&response, "content-type").as_deref(), Some("text/plain"));
        let body = to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body.as_ref(), b"hello");
    }

    #[actix_rt::test]
    async fn structured_reply() {
        let ctx = reply_context(Encoding::Structured);
        let response = write_cloud_event(&ctx, Some(event()), &Transformers::new()).unwrap();
        assert_eq!(header(&response, "content-type").as_deref(), Some(JSON_MEDIA_TYPE));
        assert!(header(&response, "ce-id").is_none());
    }

    #[actix_rt::test]
    async fn batch_reply() {
        let response = write_batch(&[event(), event()]).unwrap();
        assert_eq!(header(&response, "content-type").as_deref(), Some(JSON_BATCH_MEDIA_TYPE));
        let body = to_bytes(response.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        assert_eq!(write_batch(&[]).unwrap().status(), StatusCode::ACCEPTED);
    }
}
