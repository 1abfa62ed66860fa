use std::{fmt, sync::Arc};

use tokio::sync::oneshot;

use crate::{
    callback::{OneshotCallback, Pending},
    AsyncCallback, BasicRequestHandler, CancellationToken, ClientOptions, Executor, HttpRequest,
    ParameterMap, ReqwestTransport, RequestHandler, ResponseFuture, Result, RetryEngine,
    ThreadExecutor, Transport,
};

/// Handle to a submitted request.
///
/// Dropping it leaves the request running.
#[derive(Clone, Debug)]
pub struct Submission {
    cancel: CancellationToken,
}

impl Submission {
    /// Interrupts the wait before the next retry. The callback still fires,
    /// with the failure that would have been retried.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
/// HTTP client that runs every request on an [`Executor`] and reports the
/// outcome through a callback.
///
/// Retries follow the Fibonacci timeout schedule of [`RetryEngine`].
pub struct AsyncHttpClient {
    engine: Arc<RetryEngine>,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for AsyncHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHttpClient")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl AsyncHttpClient {
    /// Creates a client for `base_url` that starts a thread per request and
    /// retries with [`BasicRequestHandler`].
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self::with_executor(
            ThreadExecutor::new(),
            ReqwestTransport::new(base_url)?,
        ))
    }

    /// Creates a client with the given execution strategy and transport.
    pub fn with_executor(
        executor: impl Executor + 'static,
        transport: impl Transport + 'static,
    ) -> Self {
        Self::with_handler(executor, transport, BasicRequestHandler)
    }

    /// Creates a client with a custom recoverability policy.
    pub fn with_handler(
        executor: impl Executor + 'static,
        transport: impl Transport + 'static,
        handler: impl RequestHandler + 'static,
    ) -> Self {
        Self {
            engine: Arc::new(RetryEngine::new(Arc::new(transport), Arc::new(handler))),
            executor: Arc::new(executor),
        }
    }

    /// Applies retry options.
    pub fn with_options(self, opts: ClientOptions) -> Result<Self> {
        self.engine.apply(&opts)?;
        Ok(self)
    }

    pub fn engine(&self) -> &RetryEngine {
        &self.engine
    }

    pub fn max_retries(&self) -> u32 {
        self.engine.max_retries()
    }

    /// Sets the retry budget, `1..=18`. Requests already running keep their
    /// budget.
    pub fn set_max_retries(&self, max_retries: u32) -> Result<()> {
        self.engine.set_max_retries(max_retries)
    }

    /// GET with `params` in the query string.
    pub fn get<C: AsyncCallback>(
        &self,
        path: &str,
        params: impl Into<ParameterMap>,
        callback: C,
    ) -> Result<Submission> {
        self.execute_async(HttpRequest::get(path, params), callback)
    }

    /// HEAD with `params` in the query string.
    pub fn head<C: AsyncCallback>(
        &self,
        path: &str,
        params: impl Into<ParameterMap>,
        callback: C,
    ) -> Result<Submission> {
        self.execute_async(HttpRequest::head(path, params), callback)
    }

    /// DELETE with `params` in the query string.
    pub fn delete<C: AsyncCallback>(
        &self,
        path: &str,
        params: impl Into<ParameterMap>,
        callback: C,
    ) -> Result<Submission> {
        self.execute_async(HttpRequest::delete(path, params), callback)
    }

    /// POST with `params` form-encoded in the body.
    pub fn post<C: AsyncCallback>(
        &self,
        path: &str,
        params: impl Into<ParameterMap>,
        callback: C,
    ) -> Result<Submission> {
        self.execute_async(HttpRequest::post_form(path, params), callback)
    }

    /// POST with a raw body.
    pub fn post_bytes<C: AsyncCallback>(
        &self,
        path: &str,
        content_type: &str,
        data: impl Into<Vec<u8>>,
        callback: C,
    ) -> Result<Submission> {
        self.execute_async(HttpRequest::post(path, content_type, data), callback)
    }

    /// PUT with a raw body.
    pub fn put<C: AsyncCallback>(
        &self,
        path: &str,
        content_type: &str,
        data: impl Into<Vec<u8>>,
        callback: C,
    ) -> Result<Submission> {
        self.execute_async(HttpRequest::put(path, content_type, data), callback)
    }

    /// Runs `request` on the executor and reports to `callback`.
    ///
    /// Returns as soon as the work is scheduled. The callback fires exactly
    /// once in every case: if the job is refused, dropped unrun, or panics,
    /// it gets [`Error::Abandoned`](crate::Error::Abandoned). A refusal also
    /// makes this return the executor's error.
    pub fn execute_async<C: AsyncCallback>(
        &self,
        request: HttpRequest,
        callback: C,
    ) -> Result<Submission> {
        let cancel = CancellationToken::new();
        let engine = Arc::clone(&self.engine);
        let token = cancel.clone();
        let pending = Pending::new(callback);
        self.executor.spawn(Box::new(move || {
            let outcome = engine.execute_with(&request, &token);
            pending.deliver(outcome);
        }))?;
        Ok(Submission { cancel })
    }

    /// Runs `request` on the executor and returns a future for the outcome.
    pub fn execute_future(&self, request: HttpRequest) -> Result<ResponseFuture> {
        let (tx, rx) = oneshot::channel();
        let submission = self.execute_async(request, OneshotCallback(tx))?;
        Ok(ResponseFuture::new(rx, submission.cancel))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc, Arc, Mutex,
        },
        thread,
        time::{Duration, Instant},
    };

    use super::AsyncHttpClient;
    use crate::{
        ClientOptions, Error, Executor, HttpMethod, HttpRequest, HttpResponse, Job, MaxRetries,
        Result, ThreadExecutor, TokioExecutor, Transport,
    };

    /// Echoes the request path, sleeping for the `delay_ms` query parameter
    /// first. Paths under `/fail` get a 400.
    #[derive(Default)]
    struct EchoTransport {
        seen: Mutex<Vec<(HttpMethod, String)>>,
    }

    impl Transport for EchoTransport {
        fn send(&self, request: &HttpRequest, _timeout: Duration) -> Result<HttpResponse> {
            self.seen
                .lock()
                .expect("lock")
                .push((request.method, request.path.clone()));
            if let Some(ms) = request.query.get("delay_ms") {
                let ms = ms.parse().expect("numeric delay");
                thread::sleep(Duration::from_millis(ms));
            }
            if request.path.starts_with("/fail") {
                return Err(Error::Http {
                    status: 400,
                    body: request.path.clone(),
                });
            }
            Ok(HttpResponse::new(200, request.path.clone()))
        }
    }

    /// Always fails with a retryable status.
    struct FlakyTransport;

    impl Transport for FlakyTransport {
        fn send(&self, _request: &HttpRequest, _timeout: Duration) -> Result<HttpResponse> {
            Err(Error::Http {
                status: 503,
                body: String::new(),
            })
        }
    }

    struct PanickingTransport;

    impl Transport for PanickingTransport {
        fn send(&self, _request: &HttpRequest, _timeout: Duration) -> Result<HttpResponse> {
            panic!("transport blew up")
        }
    }

    struct RefusingExecutor;

    impl Executor for RefusingExecutor {
        fn spawn(&self, _job: Job) -> Result<()> {
            Err(Error::Spawn(std::io::Error::other("pool is full")))
        }
    }

    fn recv(rx: &mpsc::Receiver<Result<HttpResponse>>) -> Result<HttpResponse> {
        rx.recv_timeout(Duration::from_secs(5))
            .expect("callback must fire")
    }

    #[test]
    fn submit_returns_before_request_finishes() {
        let client = AsyncHttpClient::with_executor(ThreadExecutor::new(), EchoTransport::default());
        let (tx, rx) = mpsc::channel();

        let started = Instant::now();
        client
            .get("/slow", [("delay_ms", "300")], move |outcome: Result<HttpResponse>| {
                tx.send(outcome).expect("receiver alive")
            })
            .expect("submit must succeed");
        assert!(started.elapsed() < Duration::from_millis(300));

        let response = recv(&rx).expect("success");
        assert_eq!(response.body_as_string(), "/slow");
    }

    #[test]
    fn failure_is_delivered_to_on_error() {
        let client = AsyncHttpClient::with_executor(ThreadExecutor::new(), EchoTransport::default());
        let (tx, rx) = mpsc::channel();

        client
            .delete("/fail/item", (), move |outcome: Result<HttpResponse>| {
                tx.send(outcome).expect("receiver alive")
            })
            .expect("submit must succeed");

        assert!(matches!(recv(&rx), Err(Error::Http { status: 400, .. })));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn concurrent_submissions_complete_independently() {
        let transport = Arc::new(EchoTransport::default());
        let client = AsyncHttpClient::with_executor(ThreadExecutor::new(), Arc::clone(&transport));
        let (tx, rx) = mpsc::channel();
        let deliveries = Arc::new(AtomicUsize::new(0));

        for path in ["/a", "/b"] {
            let tx = tx.clone();
            let deliveries = Arc::clone(&deliveries);
            client
                .get(path, [("delay_ms", "50")], move |outcome: Result<HttpResponse>| {
                    deliveries.fetch_add(1, Ordering::SeqCst);
                    tx.send(outcome).expect("receiver alive");
                })
                .expect("submit must succeed");
        }

        let mut bodies = vec![
            recv(&rx).expect("success").body_as_string(),
            recv(&rx).expect("success").body_as_string(),
        ];
        bodies.sort();
        assert_eq!(bodies, ["/a", "/b"]);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(deliveries.load(Ordering::SeqCst), 2);
        assert_eq!(transport.seen.lock().expect("lock").len(), 2);
    }

    #[test]
    fn verb_helpers_build_matching_requests() {
        let transport = Arc::new(EchoTransport::default());
        let client = AsyncHttpClient::with_executor(ThreadExecutor::new(), Arc::clone(&transport));
        let (tx, rx) = mpsc::channel();

        let callback = |tx: &mpsc::Sender<Result<HttpResponse>>| {
            let tx = tx.clone();
            move |outcome: Result<HttpResponse>| tx.send(outcome).expect("receiver alive")
        };
        client.get("/g", (), callback(&tx)).expect("submit");
        client.head("/h", (), callback(&tx)).expect("submit");
        client.post("/p", [("k", "v")], callback(&tx)).expect("submit");
        client
            .post_bytes("/pb", "text/plain", "raw", callback(&tx))
            .expect("submit");
        client.put("/u", "text/plain", "raw", callback(&tx)).expect("submit");
        client.delete("/d", (), callback(&tx)).expect("submit");
        for _ in 0..6 {
            recv(&rx).expect("success");
        }

        let mut seen = transport.seen.lock().expect("lock").clone();
        seen.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(
            seen,
            [
                (HttpMethod::Delete, "/d".to_owned()),
                (HttpMethod::Get, "/g".to_owned()),
                (HttpMethod::Head, "/h".to_owned()),
                (HttpMethod::Post, "/p".to_owned()),
                (HttpMethod::Post, "/pb".to_owned()),
                (HttpMethod::Put, "/u".to_owned()),
            ]
        );
    }

    #[test]
    fn cancelling_submission_stops_retry_wait() {
        let client = AsyncHttpClient::with_executor(ThreadExecutor::new(), FlakyTransport)
            .with_options(ClientOptions {
                max_retries: MaxRetries::new(5).expect("valid"),
                timeout_base_ms: 10_000,
            })
            .expect("valid options");
        let (tx, rx) = mpsc::channel();

        let submission = client
            .get("/flaky", (), move |outcome: Result<HttpResponse>| tx.send(outcome).expect("receiver alive"))
            .expect("submit must succeed");
        thread::sleep(Duration::from_millis(50));
        submission.cancel();

        assert!(matches!(recv(&rx), Err(Error::Http { status: 503, .. })));
    }

    #[test]
    fn refused_job_surfaces_spawn_error() {
        let client = AsyncHttpClient::with_executor(RefusingExecutor, EchoTransport::default());
        let (tx, rx) = mpsc::channel();

        let err = client
            .get("/never", (), move |outcome: Result<HttpResponse>| {
                tx.send(outcome).expect("receiver alive")
            })
            .expect_err("executor refuses");

        assert!(matches!(err, Error::Spawn(_)));
        assert!(matches!(recv(&rx), Err(Error::Abandoned)));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn job_dropped_by_stopped_runtime_reports_abandoned() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let handle = runtime.handle().clone();
        drop(runtime);

        let client =
            AsyncHttpClient::with_executor(TokioExecutor::new(handle), EchoTransport::default());
        let (tx, rx) = mpsc::channel();

        client
            .get("/orphan", (), move |outcome: Result<HttpResponse>| {
                tx.send(outcome).expect("receiver alive")
            })
            .expect("spawning on a stopped runtime is not refused");

        assert!(matches!(recv(&rx), Err(Error::Abandoned)));
    }

    #[test]
    fn panicking_transport_reports_abandoned() {
        let client = AsyncHttpClient::with_executor(ThreadExecutor::new(), PanickingTransport);
        let (tx, rx) = mpsc::channel();

        client
            .get("/boom", (), move |outcome: Result<HttpResponse>| {
                tx.send(outcome).expect("receiver alive")
            })
            .expect("submit must succeed");

        assert!(matches!(recv(&rx), Err(Error::Abandoned)));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn max_retries_setter_is_validated() {
        let client = AsyncHttpClient::with_executor(ThreadExecutor::new(), EchoTransport::default());
        assert_eq!(client.max_retries(), 3);
        client.set_max_retries(18).expect("upper bound is valid");
        assert!(matches!(
            client.set_max_retries(19),
            Err(Error::InvalidMaxRetries(19))
        ));
        assert_eq!(client.max_retries(), 18);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn execute_future_resolves_on_tokio_executor() {
        let executor = TokioExecutor::current().expect("inside runtime");
        let client = AsyncHttpClient::with_executor(executor, EchoTransport::default());

        let response = client
            .execute_future(HttpRequest::get("/future", ()))
            .expect("submit must succeed")
            .await
            .expect("success");

        assert_eq!(response.body_as_string(), "/future");
    }
}
