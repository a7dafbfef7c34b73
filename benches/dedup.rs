use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::future::join_all;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::runtime::Runtime;
use transportnet::base::kind::TransportKind;
use transportnet::base::neterror::TransportError;
use transportnet::channel::{BoxedSocket, Channel, ChannelTransport};
use transportnet::establish::{Establish, Handshaking, Opening};
use transportnet::factory::{Factory, TransportRequest};

/// Establisher whose attempts never finish, so every slot stays registered.
struct Idle;

fn unsupported(what: &str) -> TransportError {
    TransportError::InvalidArguments { protocol: what.to_string(), reason: "bench".to_string() }
}

impl Establish for Idle {
    fn open_socket(&self, _address: &str, _port: Option<u16>) -> Opening {
        Box::pin(futures::future::pending())
    }

    fn wrap_socket(
        &self,
        socket: BoxedSocket,
        _address: Option<&str>,
        _port: Option<u16>,
    ) -> Result<Channel, TransportError> {
        Ok(Channel::new(TransportKind::Socket, "bench", ChannelTransport::Stream(socket)))
    }

    fn open_http(&self, _cs: &str, _address: &str, _port: Option<u16>) -> Handshaking {
        Box::pin(futures::future::pending())
    }

    fn open_websocket(&self, _cs: &str, _address: &str, _port: Option<u16>) -> Handshaking {
        Box::pin(futures::future::pending())
    }

    fn open_inproc(&self, channel_id: &str) -> Result<Channel, TransportError> {
        let (a, _b) = tokio::io::duplex(64);
        let transport = ChannelTransport::Stream(BoxedSocket::new(a));
        Ok(Channel::new(TransportKind::InProc, channel_id, transport))
    }

    fn spawn_process(&self, _command: &str, _args: &[String]) -> Result<Channel, TransportError> {
        Err(unsupported("proc"))
    }

    fn attach_external_process(
        &self,
        _command: &str,
        _args: &[String],
    ) -> Result<Channel, TransportError> {
        Err(unsupported("externalproc"))
    }
}

/// Requests that join an in-flight slot: a registry lookup plus a watch subscribe.
fn benchmark_dedup_hits(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let _guard = rt.enter();
    let factory = Factory::with_establisher(Arc::new(Idle));
    let _first = factory.request(TransportRequest::initiating_socket("db.local", 5432));

    c.bench_function("request_dedup_hit", |b| {
        b.iter(|| {
            black_box(factory.request(TransportRequest::initiating_socket("db.local", 5432)))
        })
    });

    c.bench_function("request_tagged_dedup_hit", |b| {
        b.iter(|| black_box(factory.request_tagged("initiatingsocket", &["db.local", "5432"])))
    });

    c.bench_function("request_rejected_unsupported", |b| {
        b.iter(|| black_box(factory.request_tagged("carrier-pigeon", &[])))
    });
}

/// One settled result awaited by many observers.
fn benchmark_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let factory = rt.block_on(async { Factory::with_establisher(Arc::new(Idle)) });

    c.bench_function("settled_fanout_64", |b| {
        b.to_async(&rt).iter(|| async {
            let result = factory.request(TransportRequest::inproc("bus"));
            let outcomes = join_all((0..64).map(|_| result.clone().into_future())).await;
            black_box(outcomes.len())
        })
    });
}

/// Slot creation and shutdown of a fresh factory with many pending keys.
fn benchmark_shutdown(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let _guard = rt.enter();

    c.bench_function("shutdown_100_slots", |b| {
        b.iter(|| {
            let factory = Factory::with_establisher(Arc::new(Idle));
            for port in 0..100u16 {
                let _ = factory.request(TransportRequest::initiating_socket("db.local", port));
            }
            black_box(factory.shutdown("bench"))
        })
    });
}

criterion_group!(benches, benchmark_dedup_hits, benchmark_fanout, benchmark_shutdown);
criterion_main!(benches);
