//! Tests for typed dispatch, body assembly, and coordination.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::dispatch::{
        BodyAssembly, BodyEvent, BodyHandler, BodyParams, BodylessHandler, BodylessParams,
        Coordinator, Dispatch, Flow, HandlerError, Json, RequestContext, ResponseBody,
        ResponseSink, ResponseWriter, StreamError,
    };
    use crate::parser::{Headers, HttpRequest, HttpVersion, Method};
    use crate::router::Router;
    use crate::server::{HttpResponse, StatusCode};

    #[derive(Default)]
    struct RecordingSink {
        responses: Vec<HttpResponse>,
    }

    impl ResponseSink for RecordingSink {
        fn send(&mut self, response: HttpResponse) {
            self.responses.push(response);
        }
    }

    fn request(method: Method, target: &str) -> HttpRequest {
        let headers: Headers = [("hello", "world")].into_iter().collect();
        HttpRequest::new(method, target, HttpVersion::Http11, headers)
    }

    /// Parameters requiring path placeholder `hello`, query `hello`, and
    /// collecting the `hello` header values.
    struct HelloParams {
        path_param: String,
        query_param: Vec<String>,
        header_param: Vec<String>,
    }

    impl BodylessParams for HelloParams {
        fn from_parts(
            path_params: &HashMap<String, String>,
            query_params: &[(String, String)],
            headers: &Headers,
        ) -> Option<Self> {
            let path_param = path_params.get("hello")?.clone();
            let query_param: Vec<String> = query_params
                .iter()
                .filter(|(k, _)| k == "hello")
                .map(|(_, v)| v.clone())
                .collect();
            if query_param.is_empty() {
                return None;
            }
            Some(Self {
                path_param,
                query_param,
                header_param: headers
                    .get_all("hello")
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
        }
    }

    struct HelloHandler {
        calls: Arc<AtomicUsize>,
    }

    impl BodylessHandler for HelloHandler {
        type Params = HelloParams;

        fn serve(
            &self,
            _request: &HttpRequest,
            _context: &RequestContext<'_>,
            params: HelloParams,
            response: &mut ResponseWriter<'_>,
        ) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(params.path_param, "world");
            assert_eq!(params.query_param, vec!["world".to_string()]);
            assert_eq!(params.header_param, vec!["world".to_string()]);
            response.send(
                HttpResponse::new(StatusCode::Ok)
                    .with_content_type("text/plain")
                    .with_body_string("pass"),
            );
            Ok(())
        }
    }

    /// Body parameters that echo the assembled body back as a string.
    struct EchoBodyParams {
        body: String,
    }

    impl BodyParams for EchoBodyParams {
        fn from_parts(
            path_params: &HashMap<String, String>,
            _query_params: &[(String, String)],
            _headers: &Headers,
            body: &[u8],
        ) -> Option<Self> {
            path_params.get("hello")?;
            Some(Self {
                body: String::from_utf8(body.to_vec()).ok()?,
            })
        }
    }

    struct EchoBodyHandler {
        calls: Arc<AtomicUsize>,
    }

    impl BodyHandler for EchoBodyHandler {
        type Params = EchoBodyParams;

        fn serve(
            &self,
            _request: &HttpRequest,
            _context: &RequestContext<'_>,
            params: EchoBodyParams,
        ) -> Result<(HttpResponse, Box<dyn ResponseBody>), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((
                HttpResponse::new(StatusCode::Ok).with_content_type("text/plain"),
                Box::new(params.body),
            ))
        }
    }

    /// Stops the stream once six body bytes have been received.
    struct CancellingHandler {
        calls: Arc<AtomicUsize>,
    }

    impl BodyHandler for CancellingHandler {
        type Params = EchoBodyParams;

        fn poll_chunk(&self, received: usize) -> Flow {
            if received >= 6 {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }

        fn serve(
            &self,
            _request: &HttpRequest,
            _context: &RequestContext<'_>,
            _params: EchoBodyParams,
        ) -> Result<(HttpResponse, Box<dyn ResponseBody>), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((HttpResponse::new(StatusCode::Ok), Box::new("unreachable")))
        }
    }

    struct AnyParams;

    impl BodylessParams for AnyParams {
        fn from_parts(
            _path_params: &HashMap<String, String>,
            _query_params: &[(String, String)],
            _headers: &Headers,
        ) -> Option<Self> {
            Some(AnyParams)
        }
    }

    struct FaultyHandler;

    impl BodylessHandler for FaultyHandler {
        type Params = AnyParams;

        fn serve(
            &self,
            _request: &HttpRequest,
            _context: &RequestContext<'_>,
            _params: AnyParams,
            _response: &mut ResponseWriter<'_>,
        ) -> Result<(), HandlerError> {
            Err(HandlerError::new("boom"))
        }
    }

    struct SilentHandler;

    impl BodylessHandler for SilentHandler {
        type Params = AnyParams;

        fn serve(
            &self,
            _request: &HttpRequest,
            _context: &RequestContext<'_>,
            _params: AnyParams,
            _response: &mut ResponseWriter<'_>,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn test_bodyless_dispatch_binds_and_serves() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_bodyless(Method::GET, "/{hello}", HelloHandler { calls: calls.clone() })
            .unwrap();
        let coordinator = Coordinator::new(router);

        let mut sink = RecordingSink::default();
        let response = match coordinator.handle(request(Method::GET, "/world?hello=world"), &mut sink) {
            Dispatch::Immediate(response) => response,
            Dispatch::StreamBody(_) => panic!("bodyless route must dispatch immediately"),
        };

        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.responses.len(), 1);
        assert_eq!(sink.responses[0].body, b"pass");
    }

    #[test]
    fn test_bodyless_binding_failure_returns_400() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_bodyless(Method::GET, "/{hello}", HelloHandler { calls: calls.clone() })
            .unwrap();
        let coordinator = Coordinator::new(router);

        // Required query parameter `hello` is absent
        let mut sink = RecordingSink::default();
        let response = match coordinator.handle(request(Method::GET, "/world"), &mut sink) {
            Dispatch::Immediate(response) => response,
            Dispatch::StreamBody(_) => panic!("bodyless route must dispatch immediately"),
        };

        assert_eq!(response.status, StatusCode::BadRequest);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.responses.len(), 1);
    }

    #[test]
    fn test_no_route_returns_404_without_invoking_capability() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_bodyless(Method::GET, "/orders/{id}", HelloHandler { calls: calls.clone() })
            .unwrap();
        let coordinator = Coordinator::new(router);

        let mut sink = RecordingSink::default();
        let response = match coordinator.handle(request(Method::GET, "/users/123"), &mut sink) {
            Dispatch::Immediate(response) => response,
            Dispatch::StreamBody(_) => panic!("no-route must dispatch immediately"),
        };

        assert_eq!(response.status, StatusCode::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.responses.len(), 1);
    }

    #[test]
    fn test_handler_fault_becomes_500() {
        let mut router = Router::new();
        router.add_bodyless(Method::GET, "/fault", FaultyHandler).unwrap();
        let coordinator = Coordinator::new(router);

        let mut sink = RecordingSink::default();
        let response = match coordinator.handle(request(Method::GET, "/fault"), &mut sink) {
            Dispatch::Immediate(response) => response,
            Dispatch::StreamBody(_) => panic!("bodyless route must dispatch immediately"),
        };

        assert_eq!(response.status, StatusCode::InternalServerError);
    }

    #[test]
    fn test_bodyless_handler_writing_nothing_is_500() {
        let mut router = Router::new();
        router.add_bodyless(Method::GET, "/silent", SilentHandler).unwrap();
        let coordinator = Coordinator::new(router);

        let mut sink = RecordingSink::default();
        let response = match coordinator.handle(request(Method::GET, "/silent"), &mut sink) {
            Dispatch::Immediate(response) => response,
            Dispatch::StreamBody(_) => panic!("bodyless route must dispatch immediately"),
        };

        assert_eq!(response.status, StatusCode::InternalServerError);
        assert_eq!(sink.responses.len(), 1);
    }

    #[test]
    fn test_body_aware_assembles_chunks_and_serves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_with_body(Method::POST, "/{hello}", EchoBodyHandler { calls: calls.clone() })
            .unwrap();
        let coordinator = Coordinator::new(router);

        let mut sink = RecordingSink::default();
        {
            let mut stream =
                match coordinator.handle(request(Method::POST, "/world?hello=world"), &mut sink) {
                    Dispatch::StreamBody(stream) => stream,
                    Dispatch::Immediate(_) => panic!("body-aware route must stream"),
                };

            let mut acks = 0usize;
            let mut ack = || acks += 1;
            let flow = stream
                .on_event(BodyEvent::Chunk { data: b"hello=", ack: &mut ack })
                .unwrap();
            assert_eq!(flow, Flow::Continue);

            let mut ack = || acks += 1;
            let flow = stream
                .on_event(BodyEvent::Chunk { data: b"world", ack: &mut ack })
                .unwrap();
            assert_eq!(flow, Flow::Continue);

            // Serve must not run before `end`
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            assert_eq!(acks, 2);

            let flow = stream.on_event(BodyEvent::End).unwrap();
            assert_eq!(flow, Flow::Stop);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }

        assert_eq!(sink.responses.len(), 1);
        assert_eq!(sink.responses[0].status, StatusCode::Ok);
        assert_eq!(sink.responses[0].body, b"hello=world");
    }

    #[test]
    fn test_body_aware_empty_body_completes_on_end() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_with_body(Method::POST, "/{hello}", EchoBodyHandler { calls: calls.clone() })
            .unwrap();
        let coordinator = Coordinator::new(router);

        let mut sink = RecordingSink::default();
        {
            let mut stream = match coordinator.handle(request(Method::POST, "/world"), &mut sink) {
                Dispatch::StreamBody(stream) => stream,
                Dispatch::Immediate(_) => panic!("body-aware route must stream"),
            };
            // `end` straight from idle finalizes an empty body
            assert_eq!(stream.on_event(BodyEvent::End).unwrap(), Flow::Stop);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.responses[0].body, b"");
    }

    #[test]
    fn test_body_aware_binding_failure_writes_400() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_with_body(Method::POST, "/{hello}", EchoBodyHandler { calls: calls.clone() })
            .unwrap();
        let coordinator = Coordinator::new(router);

        // Invalid UTF-8 body makes parameter construction fail
        let mut sink = RecordingSink::default();
        {
            let mut stream = match coordinator.handle(request(Method::POST, "/world"), &mut sink) {
                Dispatch::StreamBody(stream) => stream,
                Dispatch::Immediate(_) => panic!("body-aware route must stream"),
            };
            let mut ack = || {};
            stream
                .on_event(BodyEvent::Chunk { data: &[0xff, 0xfe], ack: &mut ack })
                .unwrap();
            stream.on_event(BodyEvent::End).unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.responses.len(), 1);
        assert_eq!(sink.responses[0].status, StatusCode::BadRequest);
    }

    #[test]
    fn test_stop_mid_stream_acknowledges_then_ceases() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_with_body(Method::POST, "/{hello}", CancellingHandler { calls: calls.clone() })
            .unwrap();
        let coordinator = Coordinator::new(router);

        let mut sink = RecordingSink::default();
        {
            let mut stream = match coordinator.handle(request(Method::POST, "/world"), &mut sink) {
                Dispatch::StreamBody(stream) => stream,
                Dispatch::Immediate(_) => panic!("body-aware route must stream"),
            };

            // Six bytes trip the handler's threshold; the chunk is still
            // acknowledged exactly once before the stream stops.
            let mut acks = 0usize;
            let mut ack = || acks += 1;
            let flow = stream
                .on_event(BodyEvent::Chunk { data: b"hello=", ack: &mut ack })
                .unwrap();
            assert_eq!(flow, Flow::Stop);
            assert_eq!(acks, 1);

            // Further events are protocol violations
            let mut ack = || {};
            let result = stream.on_event(BodyEvent::Chunk { data: b"world", ack: &mut ack });
            assert!(matches!(result, Err(StreamError::Terminal(_))));
            let result = stream.on_event(BodyEvent::End);
            assert!(matches!(result, Err(StreamError::Terminal(_))));
        }

        // Serve never ran and no response was produced
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sink.responses.is_empty());
    }

    #[test]
    fn test_events_after_end_are_protocol_violations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_with_body(Method::POST, "/{hello}", EchoBodyHandler { calls: calls.clone() })
            .unwrap();
        let coordinator = Coordinator::new(router);

        let mut sink = RecordingSink::default();
        {
            let mut stream = match coordinator.handle(request(Method::POST, "/world"), &mut sink) {
                Dispatch::StreamBody(stream) => stream,
                Dispatch::Immediate(_) => panic!("body-aware route must stream"),
            };
            stream.on_event(BodyEvent::End).unwrap();

            assert!(matches!(
                stream.on_event(BodyEvent::End),
                Err(StreamError::Terminal("completed"))
            ));
            let mut ack = || {};
            assert!(matches!(
                stream.on_event(BodyEvent::Chunk { data: b"x", ack: &mut ack }),
                Err(StreamError::Terminal("completed"))
            ));
        }

        // Serve ran exactly once despite the repeated events
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.responses.len(), 1);
    }

    #[test]
    fn test_transport_abort_discards_buffer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_with_body(Method::POST, "/{hello}", EchoBodyHandler { calls: calls.clone() })
            .unwrap();
        let coordinator = Coordinator::new(router);

        let mut sink = RecordingSink::default();
        {
            let mut stream = match coordinator.handle(request(Method::POST, "/world"), &mut sink) {
                Dispatch::StreamBody(stream) => stream,
                Dispatch::Immediate(_) => panic!("body-aware route must stream"),
            };
            let mut ack = || {};
            stream
                .on_event(BodyEvent::Chunk { data: b"partial", ack: &mut ack })
                .unwrap();
            stream.abort();
            assert_eq!(stream.received(), 0);
            assert!(matches!(
                stream.on_event(BodyEvent::End),
                Err(StreamError::Terminal("aborted"))
            ));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sink.responses.is_empty());
    }

    #[test]
    fn test_body_assembly_state_machine() {
        let mut assembly = BodyAssembly::new();
        assert!(!assembly.is_terminal());
        assembly.push_chunk(b"ab").unwrap();
        assembly.push_chunk(b"cd").unwrap();
        assert_eq!(assembly.len(), 4);

        let body = assembly.finish().unwrap();
        assert_eq!(body, b"abcd");
        assert!(assembly.is_terminal());

        assert!(matches!(
            assembly.push_chunk(b"late"),
            Err(StreamError::Terminal("completed"))
        ));
        assert!(matches!(assembly.finish(), Err(StreamError::Terminal("completed"))));
    }

    #[test]
    fn test_body_assembly_abort_is_terminal() {
        let mut assembly = BodyAssembly::new();
        assembly.push_chunk(b"abc").unwrap();
        assembly.abort();
        assert!(assembly.is_terminal());
        assert!(assembly.is_empty());

        assert!(matches!(
            assembly.push_chunk(b"x"),
            Err(StreamError::Terminal("aborted"))
        ));
        assert!(matches!(assembly.finish(), Err(StreamError::Terminal("aborted"))));

        // Abort in a terminal state stays terminal
        assembly.abort();
        assert!(assembly.is_terminal());
    }

    #[test]
    fn test_response_body_impls() {
        assert_eq!("text".to_string().to_bytes().unwrap(), b"text");
        assert_eq!(vec![1u8, 2, 3].to_bytes().unwrap(), vec![1, 2, 3]);

        #[derive(serde::Serialize)]
        struct Payload {
            ok: bool,
        }
        let json = Json(Payload { ok: true }).to_bytes().unwrap();
        assert_eq!(json, br#"{"ok":true}"#);
    }

    #[test]
    fn test_request_context_views() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router
            .add_bodyless(Method::GET, "/{hello}", HelloHandler { calls: calls.clone() })
            .unwrap();

        let request = request(Method::GET, "/world?hello=world&hello=mars");
        let (components, _) = router.route(&request).unwrap();
        let context = RequestContext::new(&components);
        assert_eq!(context.path_param("hello"), Some("world"));
        assert_eq!(context.query_values("hello"), vec!["world", "mars"]);
        assert!(context.path_param("absent").is_none());
    }
}
