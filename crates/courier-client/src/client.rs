//! The request client orchestrator.
//!
//! [`Client`] owns the collaborator set, the middleware pipeline and the
//! event bus, and drives one call end to end: merge the cancellation signals,
//! resolve the URL, dispatch through the middlewares into the terminal
//! (transport then decoder), classify any failure, emit lifecycle events.
//!
//! There is deliberately no process-wide default client; a `Client` is a
//! cheap clonable handle meant to be passed explicitly.

use crate::call::CallBuilder;
use crate::defaults::{
    DefaultBodySerializer, DefaultErrorMapper, DefaultResponseDecoder, DefaultUrlResolver,
    HttpTransport, QuerySerializerFn,
};
use courier_core::{
    BodySerializer, Context, Error, ErrorMapper, EventBus, Request, RequestEvent, RequestMeta,
    Response, ResponseDecoder, ResponseKind, Result, TimedOut, Transport, UrlResolver,
};
use courier_middleware::{BoxFuture, Middleware, Pipeline, Terminal};
use http::header::IntoHeaderName;
use http::{HeaderMap, HeaderValue, Method};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A packaged extension: registers middlewares and swaps collaborators
/// through the client's registry surface.
pub trait Plugin {
    /// Installs this plugin on the client.
    fn install(&self, client: &Client);
}

/// The terminal handler at the center of the onion: send, then decode.
struct SendAndDecode {
    transport: Arc<dyn Transport>,
    decoder: Arc<dyn ResponseDecoder>,
}

impl Terminal for SendAndDecode {
    fn invoke<'a>(
        &'a self,
        request: Request,
        ctx: &'a mut Context,
    ) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            let result = self.transport.send(&request, ctx).await?;
            self.decoder.decode(&request, result, ctx).await
        })
    }
}

struct ClientInner {
    resolver: RwLock<Arc<dyn UrlResolver>>,
    serializer: RwLock<Arc<dyn BodySerializer>>,
    transport: RwLock<Arc<dyn Transport>>,
    decoder: RwLock<Arc<dyn ResponseDecoder>>,
    mapper: RwLock<Arc<dyn ErrorMapper>>,
    pipeline: RwLock<Pipeline>,
    events: EventBus,
    default_headers: HeaderMap,
    default_timeout: Option<Duration>,
    default_meta: RequestMeta,
}

/// The extensible HTTP request client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Starts building a client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client with stock collaborators and no defaults.
    ///
    /// # Errors
    ///
    /// Never fails without a base URL; kept fallible for symmetry with
    /// [`ClientBuilder::build`].
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    // --- registry surface -------------------------------------------------

    /// Registers an additional middleware stage.
    pub fn middleware<M: Middleware>(&self, middleware: M) -> &Self {
        self.inner.pipeline.write().push(middleware);
        self
    }

    /// Replaces the transport.
    pub fn set_transport(&self, transport: Arc<dyn Transport>) -> &Self {
        *self.inner.transport.write() = transport;
        self
    }

    /// Replaces the URL resolver.
    pub fn set_url_resolver(&self, resolver: Arc<dyn UrlResolver>) -> &Self {
        *self.inner.resolver.write() = resolver;
        self
    }

    /// Replaces the body serializer.
    ///
    /// The default transport captures the serializer it was built with; a
    /// plugin replacing the serializer for the wire path should replace the
    /// transport as well.
    pub fn set_body_serializer(&self, serializer: Arc<dyn BodySerializer>) -> &Self {
        *self.inner.serializer.write() = serializer;
        self
    }

    /// Replaces the response decoder.
    pub fn set_decoder(&self, decoder: Arc<dyn ResponseDecoder>) -> &Self {
        *self.inner.decoder.write() = decoder;
        self
    }

    /// Replaces the error mapper.
    pub fn set_error_mapper(&self, mapper: Arc<dyn ErrorMapper>) -> &Self {
        *self.inner.mapper.write() = mapper;
        self
    }

    /// Returns the current body serializer, for custom transports that
    /// encode at send time.
    #[must_use]
    pub fn body_serializer(&self) -> Arc<dyn BodySerializer> {
        self.inner.serializer.read().clone()
    }

    /// Returns the lifecycle event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Applies a plugin.
    pub fn apply(&self, plugin: &dyn Plugin) -> &Self {
        plugin.install(self);
        self
    }

    // --- call builders ----------------------------------------------------

    /// Starts a call with an explicit method.
    pub fn call(&self, method: Method, url: impl Into<String>) -> CallBuilder {
        CallBuilder::new(self.clone(), method, url.into())
    }

    /// Starts a GET call.
    pub fn get(&self, url: impl Into<String>) -> CallBuilder {
        self.call(Method::GET, url)
    }

    /// Starts a POST call.
    pub fn post(&self, url: impl Into<String>) -> CallBuilder {
        self.call(Method::POST, url)
    }

    /// Starts a PUT call.
    pub fn put(&self, url: impl Into<String>) -> CallBuilder {
        self.call(Method::PUT, url)
    }

    /// Starts a PATCH call.
    pub fn patch(&self, url: impl Into<String>) -> CallBuilder {
        self.call(Method::PATCH, url)
    }

    /// Starts a DELETE call.
    pub fn delete(&self, url: impl Into<String>) -> CallBuilder {
        self.call(Method::DELETE, url)
    }

    /// Starts a HEAD call.
    pub fn head(&self, url: impl Into<String>) -> CallBuilder {
        self.call(Method::HEAD, url)
    }

    /// Starts an OPTIONS call.
    pub fn options(&self, url: impl Into<String>) -> CallBuilder {
        self.call(Method::OPTIONS, url)
    }

    pub(crate) fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }

    pub(crate) fn default_timeout(&self) -> Option<Duration> {
        self.inner.default_timeout
    }

    pub(crate) fn default_meta(&self) -> &RequestMeta {
        &self.inner.default_meta
    }

    // --- execution --------------------------------------------------------

    /// Executes an already-built request.
    ///
    /// This is the lower-level entry; [`Client::call`] and friends merge the
    /// client defaults first and end up here.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let cancellation = request
            .cancel()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let mut ctx = Context::new(cancellation.clone());

        // Watcher ordering matters: the timed-out flag lands in the bag
        // before the cancel, so the mapper can tell this abort from a
        // user-initiated one.
        let timer = request
            .timeout()
            .filter(|timeout| !timeout.is_zero())
            .map(|timeout| {
                let bag = ctx.bag().clone();
                let cancellation = cancellation.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        () = tokio::time::sleep(timeout) => {
                            bag.insert(TimedOut);
                            cancellation.cancel();
                        }
                        () = cancellation.cancelled() => {}
                    }
                })
            });

        let resolved = {
            let resolver = self.inner.resolver.read().clone();
            resolver.resolve(&request, &ctx)
        };
        let request = match resolved {
            Ok(url) if url == request.url() => request,
            Ok(url) => request.to_builder().url(url).build(),
            Err(err) => {
                if let Some(timer) = timer {
                    timer.abort();
                }
                return Err(err);
            }
        };

        let pipeline = self.inner.pipeline.read().clone();
        let terminal = SendAndDecode {
            transport: self.inner.transport.read().clone(),
            decoder: self.inner.decoder.read().clone(),
        };

        tracing::debug!(
            call = %ctx.id(),
            method = %request.method(),
            url = request.url(),
            "request start"
        );
        self.inner.events.emit(&RequestEvent::Start {
            request: &request,
            context: &ctx,
        });

        let outcome = pipeline.dispatch(request.clone(), &mut ctx, &terminal).await;
        let elapsed = ctx.elapsed();
        if let Some(timer) = timer {
            timer.abort();
        }

        match outcome {
            Ok(response) => {
                tracing::debug!(
                    call = %ctx.id(),
                    status = %response.status(),
                    attempt = ctx.attempt(),
                    "request end"
                );
                self.inner.events.emit(&RequestEvent::End {
                    request: &request,
                    response: &response,
                    context: &ctx,
                    elapsed,
                    attempt: ctx.attempt(),
                });
                Ok(response)
            }
            Err(err) => {
                let mapped = {
                    let mapper = self.inner.mapper.read().clone();
                    mapper.map(err, &request, &ctx)
                };
                if ctx.cancellation().is_cancelled() {
                    tracing::debug!(call = %ctx.id(), "request aborted");
                    self.inner.events.emit(&RequestEvent::Abort {
                        request: &request,
                        context: &ctx,
                        elapsed,
                        attempt: ctx.attempt(),
                    });
                } else {
                    tracing::debug!(
                        call = %ctx.id(),
                        kind = mapped.kind().as_str(),
                        error = %mapped,
                        "request error"
                    );
                    self.inner.events.emit(&RequestEvent::Error {
                        request: &request,
                        error: &mapped,
                        context: &ctx,
                        elapsed,
                        attempt: ctx.attempt(),
                    });
                }
                Err(mapped)
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pipeline", &*self.inner.pipeline.read())
            .field("default_timeout", &self.inner.default_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    headers: HeaderMap,
    timeout: Option<Duration>,
    meta: RequestMeta,
    default_response_kind: Option<ResponseKind>,
    strict_decode: bool,
    query_serializer: Option<Arc<QuerySerializerFn>>,
    resolver: Option<Arc<dyn UrlResolver>>,
    serializer: Option<Arc<dyn BodySerializer>>,
    transport: Option<Arc<dyn Transport>>,
    decoder: Option<Arc<dyn ResponseDecoder>>,
    mapper: Option<Arc<dyn ErrorMapper>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl ClientBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL relative request paths resolve against.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Adds a default header sent with every call unless overridden.
    #[must_use]
    pub fn header<K: IntoHeaderName>(mut self, key: K, value: HeaderValue) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Sets the default per-call timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the default request metadata.
    #[must_use]
    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Sets the decoder's fallback response kind.
    #[must_use]
    pub fn default_response_kind(mut self, kind: ResponseKind) -> Self {
        self.default_response_kind = Some(kind);
        self
    }

    /// Makes the decoder fail when no response kind can be determined.
    #[must_use]
    pub fn strict_decode(mut self, strict: bool) -> Self {
        self.strict_decode = strict;
        self
    }

    /// Installs a custom query serializer on the default resolver.
    #[must_use]
    pub fn query_serializer(mut self, serializer: Arc<QuerySerializerFn>) -> Self {
        self.query_serializer = Some(serializer);
        self
    }

    /// Replaces the URL resolver.
    #[must_use]
    pub fn url_resolver(mut self, resolver: Arc<dyn UrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replaces the body serializer.
    #[must_use]
    pub fn body_serializer(mut self, serializer: Arc<dyn BodySerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Replaces the transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the response decoder.
    #[must_use]
    pub fn decoder(mut self, decoder: Arc<dyn ResponseDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Replaces the error mapper.
    #[must_use]
    pub fn error_mapper(mut self, mapper: Arc<dyn ErrorMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Registers a middleware stage.
    #[must_use]
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the base URL does not parse.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .map(|raw| {
                Url::parse(&raw)
                    .map_err(|err| Error::config_with_cause("invalid base URL", err))
            })
            .transpose()?;

        let serializer = self
            .serializer
            .unwrap_or_else(|| Arc::new(DefaultBodySerializer::new()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(serializer.clone())));
        let resolver = self.resolver.unwrap_or_else(|| {
            let mut resolver = DefaultUrlResolver::new(base_url);
            if let Some(query_serializer) = self.query_serializer {
                resolver = resolver.with_query_serializer(query_serializer);
            }
            Arc::new(resolver)
        });
        let decoder = self.decoder.unwrap_or_else(|| {
            let mut decoder = DefaultResponseDecoder::new().strict(self.strict_decode);
            if let Some(kind) = self.default_response_kind {
                decoder = decoder.with_default_kind(kind);
            }
            Arc::new(decoder)
        });
        let mapper = self
            .mapper
            .unwrap_or_else(|| Arc::new(DefaultErrorMapper::new()));

        let mut pipeline = Pipeline::new();
        for middleware in self.middlewares {
            pipeline.push_arc(middleware);
        }

        Ok(Client {
            inner: Arc::new(ClientInner {
                resolver: RwLock::new(resolver),
                serializer: RwLock::new(serializer),
                transport: RwLock::new(transport),
                decoder: RwLock::new(decoder),
                mapper: RwLock::new(mapper),
                pipeline: RwLock::new(pipeline),
                events: EventBus::new(),
                default_headers: self.headers,
                default_timeout: self.timeout,
                default_meta: self.meta,
            }),
        })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}
