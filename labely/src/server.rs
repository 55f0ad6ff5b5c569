use std::{fs::File, path::Path, sync::Arc};

use anyhow::{anyhow, Result};
use dropshot::{
    endpoint, ApiDescription, ConfigDropshot, ConfigLogging, ConfigLoggingLevel, HttpError, HttpResponseOk,
    HttpServerStarter, RequestContext, TypedBody,
};
use http::{header, Response, StatusCode};
use hyper::Body;
use label_api_types::{LabelSheetBody, LabelSheetResponse};
use log::info;

use crate::{
    context::Context, extract::LabelQuery, render::render_sheet_html, request::LabelRequest, resolver::ItemResolver,
    sheet::build_sheet,
};

/// Describe the API.
pub fn api() -> Result<ApiDescription<Context>> {
    let mut api = ApiDescription::new();
    /*
     * Register our endpoint and its handler function.  The "endpoint" macro
     * specifies the HTTP method and URI path that identify the endpoint,
     * allowing this metadata to live right alongside the handler function.
     */
    api.register(api_get_schema).map_err(|e| anyhow!(e))?;
    api.register(ping).map_err(|e| anyhow!(e))?;
    api.register(get_label_sheet).map_err(|e| anyhow!(e))?;
    api.register(post_label_sheet).map_err(|e| anyhow!(e))?;
    api.register(get_label_sheet_html).map_err(|e| anyhow!(e))?;

    Ok(api)
}

/// The OpenAPI document for the API, as JSON.
pub fn schema(api: &ApiDescription<Context>) -> Result<serde_json::Value> {
    Ok(open_api(api).json()?)
}

pub fn write_spec(api: &ApiDescription<Context>, spec_file: &Path) -> Result<()> {
    info!("writing OpenAPI spec to {}...", spec_file.display());
    let mut buffer = File::create(spec_file)?;
    open_api(api).write(&mut buffer)?;
    Ok(())
}

fn open_api(api: &ApiDescription<Context>) -> dropshot::OpenApiDefinition<'_, Context> {
    let mut api_definition = api.openapi("Label Sheet API", clap::crate_version!());
    api_definition
        .description("Internal API server for laying out sheets of product and material labels")
        .contact_email("labels@localhost");
    api_definition
}

pub async fn server(s: crate::core::Server, resolver: Arc<dyn ItemResolver>) -> Result<()> {
    /*
     * We must specify a configuration with a bind address.
     */
    let config_dropshot = ConfigDropshot {
        bind_address: s.address.parse()?,
        request_body_max_bytes: 1024 * 1024,
        ..Default::default()
    };

    /*
     * For simplicity, we'll configure an "info"-level logger that writes to
     * stderr assuming that it's a terminal.
     */
    let config_logging = ConfigLogging::StderrTerminal {
        level: ConfigLoggingLevel::Info,
    };
    let log = config_logging.to_logger("labely-server")?;

    let api = api()?;
    let schema = schema(&api)?.to_string();

    if let Some(spec_file) = &s.spec_file {
        write_spec(&api, spec_file)?;
    }

    /*
     * The functions that implement our API endpoints will share this context.
     */
    let api_context = Context::new(schema, resolver);

    /*
     * Set up the server.
     */
    let server = HttpServerStarter::new(&config_dropshot, api, api_context, &log)
        .map_err(|error| anyhow!("failed to start server: {}", error))?
        .start();
    info!("listening on {}", server.local_addr());

    server.await.map_err(|e| anyhow!(e))
}

/*
 * HTTP API interface
 */

/**
 * Return the OpenAPI schema in JSON format.
 */
#[endpoint {
    method = GET,
    path = "/",
}]
async fn api_get_schema(rqctx: RequestContext<Context>) -> Result<HttpResponseOk<String>, HttpError> {
    let api_context = rqctx.context();

    Ok(HttpResponseOk(api_context.schema.to_string()))
}

/** Return pong. */
#[endpoint {
    method = GET,
    path = "/ping",
}]
async fn ping(_rqctx: RequestContext<Context>) -> Result<HttpResponseOk<String>, HttpError> {
    Ok(HttpResponseOk("pong".to_string()))
}

/** Lay out a sheet of labels from query parameters. */
#[endpoint {
    method = GET,
    path = "/labels/sheet",
}]
async fn get_label_sheet(
    rqctx: RequestContext<Context>,
    query_params: LabelQuery,
) -> Result<HttpResponseOk<LabelSheetResponse>, HttpError> {
    let request = query_params.into_inner();

    Ok(HttpResponseOk(sheet_for(rqctx.context(), &request).await))
}

/** Lay out a sheet of labels from a JSON body. */
#[endpoint {
    method = POST,
    path = "/labels/sheet",
}]
async fn post_label_sheet(
    rqctx: RequestContext<Context>,
    body_param: TypedBody<LabelSheetBody>,
) -> Result<HttpResponseOk<LabelSheetResponse>, HttpError> {
    let request = LabelRequest::from_body(&body_param.into_inner());

    Ok(HttpResponseOk(sheet_for(rqctx.context(), &request).await))
}

/** Render a sheet of labels as a printable HTML page. */
#[endpoint {
    method = GET,
    path = "/labels/sheet/html",
}]
async fn get_label_sheet_html(
    rqctx: RequestContext<Context>,
    query_params: LabelQuery,
) -> Result<Response<Body>, HttpError> {
    let request = query_params.into_inner();
    let sheet = sheet_for(rqctx.context(), &request).await;

    html_response(&sheet)
}

async fn sheet_for(ctx: &Context, request: &LabelRequest) -> LabelSheetResponse {
    sentry::start_session();
    let sheet = build_sheet(ctx.resolver.as_ref(), request).await;
    sentry::end_session();

    sheet
}

fn html_response(sheet: &LabelSheetResponse) -> Result<Response<Body>, HttpError> {
    let html = render_sheet_html(sheet).map_err(|e| {
        sentry::capture_message(&format!("rendering label sheet failed: {}", e), sentry::Level::Error);
        HttpError::for_internal_error(format!("rendering label sheet failed: {}", e))
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(html.into())
        .map_err(|e| HttpError::for_internal_error(e.to_string()))
}
