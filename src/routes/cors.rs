use poem::{
    Endpoint, IntoResponse, Middleware, Request, Response, Result,
    http::{HeaderValue, header},
};

/// Sets `Access-Control-Allow-Origin` on every response, echoing the
/// request's `Origin` or `*` when there is none.
pub struct AllowAllOrigins;

impl<E: Endpoint> Middleware<E> for AllowAllOrigins {
    type Output = AllowAllOriginsEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        AllowAllOriginsEndpoint { inner: ep }
    }
}

pub struct AllowAllOriginsEndpoint<E> {
    inner: E,
}

impl<E: Endpoint> Endpoint for AllowAllOriginsEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        let origin = req
            .headers()
            .get(header::ORIGIN)
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("*"));

        let mut resp = match self.inner.call(req).await {
            Ok(resp) => resp.into_response(),
            Err(err) => err.into_response(),
        };
        resp.headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        Ok(resp)
    }
}
