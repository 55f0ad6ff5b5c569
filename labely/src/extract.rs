use async_trait::async_trait;
use dropshot::{
    ApiEndpointBodyContentType, ExtractorMetadata, HttpError, Query, RequestContext, ServerContext, SharedExtractor,
};
use label_api_types::LabelSheetQuery;

use crate::request::LabelRequest;

/// A label request read straight from the query string.
///
/// dropshot's `Query` rejects a key given twice, which is how many clients send
/// an array (`ids=P001&ids=P002`). This reads every pair instead, while
/// documenting the same parameters as `Query<LabelSheetQuery>`.
#[derive(Debug)]
pub struct LabelQuery(pub LabelRequest);

impl LabelQuery {
    pub fn into_inner(self) -> LabelRequest {
        self.0
    }
}

#[async_trait]
impl SharedExtractor for LabelQuery {
    async fn from_request<Context: ServerContext>(rqctx: &RequestContext<Context>) -> Result<LabelQuery, HttpError> {
        let raw = rqctx.request.uri().query().unwrap_or("");

        LabelRequest::from_query_string(raw)
            .map(LabelQuery)
            .map_err(|e| HttpError::for_bad_request(None, format!("unable to parse query string: {}", e)))
    }

    fn metadata(body_content_type: ApiEndpointBodyContentType) -> ExtractorMetadata {
        <Query<LabelSheetQuery> as SharedExtractor>::metadata(body_content_type)
    }
}
