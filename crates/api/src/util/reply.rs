use http_body_util::Full;
use hyper::{
    body::Bytes,
    header::{HeaderValue, CONTENT_TYPE, SET_COOKIE},
    Response, StatusCode,
};
use serde::Serialize;

pub type Reply = Response<Full<Bytes>>;

/// A bodiless response with the given status.
pub fn empty(status: StatusCode) -> Reply {
    let mut res = Response::new(Full::default());
    *res.status_mut() = status;
    res
}

/// Serializes the value as the JSON body of the response.
pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Result<Reply, StatusCode> {
    let bytes = serde_json::to_vec(value).map_err(|err| {
        log::error!("cannot serialize response body: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let mut res = Response::new(Full::new(Bytes::from(bytes)));
    *res.status_mut() = status;
    assert!(res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json")).is_none());
    Ok(res)
}

pub fn with_cookie(mut res: Reply, cookie: &str) -> Result<Reply, StatusCode> {
    let value = HeaderValue::from_str(cookie).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    assert!(!res.headers_mut().append(SET_COOKIE, value));
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sets_content_type_and_status() {
        let res = json(StatusCode::CREATED, &serde_json::json!({ "id": 7 })).unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn cookies_are_appended() {
        let res = with_cookie(empty(StatusCode::NO_CONTENT), "sid=00; Path=/").unwrap();
        assert_eq!(res.headers()[SET_COOKIE], "sid=00; Path=/");
        assert!(with_cookie(empty(StatusCode::OK), "bad\ncookie").is_err());
    }
}
