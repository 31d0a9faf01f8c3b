use std::{future::Future, sync::Arc, time::Duration};

use tokio::{net::TcpListener, sync::Semaphore};

use crate::{handlers::Registry, session};

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// how long a session waits for its request
    pub read_timeout: Duration,
    /// sessions allowed to run at the same time, 1 serves clients one by one
    pub max_connections: u32,
}

/// Accepts connections until `shutdown` completes, then waits for running sessions
///
/// every connection gets its own task, errors of a single connection are
/// logged and never stop the listener.
pub async fn run(
    listener: TcpListener,
    registry: Arc<Registry>,
    limits: Limits,
    shutdown: impl Future,
) {
    let permits = Arc::new(Semaphore::new(limits.max_connections as usize));

    tokio::select! {
        _ = accept_loop(&listener, &registry, &permits, limits.read_timeout) => {}
        _ = shutdown => {
            tracing::info!("shutting down, no longer accepting connections");
        }
    }

    // each running session holds a permit until it's done
    if permits.acquire_many(limits.max_connections).await.is_ok() {
        tracing::info!("all sessions have completed");
    }
}

async fn accept_loop(
    listener: &TcpListener,
    registry: &Arc<Registry>,
    permits: &Arc<Semaphore>,
    read_timeout: Duration,
) {
    loop {
        // wait for a free slot before accepting, pending clients stay in the backlog
        let Ok(permit) = permits.clone().acquire_owned().await else {
            return;
        };

        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!("failed to accept a connection: {}", err);
                continue;
            }
        };
        tracing::info!("client connected: {}", peer);

        let registry = registry.clone();
        tokio::spawn(async move {
            match session::run_once(stream, &registry, read_timeout).await {
                Ok(()) => tracing::info!("client disconnected: {}", peer),
                Err(err) => tracing::warn!("session with {} was aborted: {}", peer, err),
            }

            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, net::SocketAddr, path::Path, sync::Arc, time::Duration};

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        sync::oneshot,
        task::JoinHandle,
    };

    use crate::{
        catalog::{Catalog, Course},
        handlers::{Handler, Registry},
        protocol::message::Response,
        registration::RegistrationLog,
    };

    use super::{run, Limits};

    struct TestServer {
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<()>,
    }

    async fn start(dir: &Path, max_connections: u32) -> TestServer {
        fs::write(
            dir.join("cours.txt"),
            "INF101\tAlgorithms\tAutomne\nINF202\tNetworks\tHiver\n",
        )
        .unwrap();

        let mut registry = Registry::default();
        registry.register(Handler::Load(Catalog::new(dir.join("cours.txt"))));
        registry.register(Handler::Register(RegistrationLog::new(
            dir.join("inscription.txt"),
        )));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let limits = Limits {
            read_timeout: Duration::from_secs(5),
            max_connections,
        };
        let (shutdown, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(run(listener, Arc::new(registry), limits, rx));

        TestServer {
            addr,
            shutdown,
            task,
        }
    }

    async fn send(stream: &mut TcpStream, request: &str) -> Vec<Response> {
        stream
            .write_all(format!("{}\n", request).as_bytes())
            .await
            .unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        raw.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    async fn request(addr: SocketAddr, request: &str) -> Vec<Response> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        send(&mut stream, request).await
    }

    fn registration(student_id: &str) -> String {
        format!(
            r#"{{"command":"INSCRIRE","form":{{"course":{{"code":"INF101","session":"Automne"}},"studentId":"{}","firstName":"A","lastName":"B","email":"a@b.c"}}}}"#,
            student_id
        )
    }

    #[tokio::test]
    async fn serves_consecutive_connections() {
        let dir = tempfile::tempdir().unwrap();
        let server = start(dir.path(), 1).await;

        assert_eq!(
            request(server.addr, r#"{"command":"CHARGER 1"}"#).await,
            [Response::courses(vec![Course::new(
                "INF101",
                "Algorithms",
                "Automne"
            )])]
        );

        // a client leaving without a word doesn't affect the listener
        drop(TcpStream::connect(server.addr).await.unwrap());

        assert_eq!(
            request(server.addr, r#"{"command":"CHARGER 2"}"#).await,
            [Response::courses(vec![Course::new(
                "INF202", "Networks", "Hiver"
            )])]
        );

        assert_eq!(request(server.addr, &registration("123")).await, [Response::ok()]);
        assert_eq!(
            fs::read_to_string(dir.path().join("inscription.txt")).unwrap(),
            "\nAutomne\tINF101\t123\tA\tB\ta@b.c"
        );

        server.shutdown.send(()).unwrap();
        server.task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations() {
        const CLIENTS: usize = 32;

        let dir = tempfile::tempdir().unwrap();
        let server = start(dir.path(), 8).await;

        let mut clients = vec![];
        for idx in 0..CLIENTS {
            let addr = server.addr;
            clients.push(tokio::spawn(async move {
                request(addr, &registration(&idx.to_string())).await
            }));
        }
        for client in clients {
            assert_eq!(client.await.unwrap(), [Response::ok()]);
        }

        let content = fs::read_to_string(dir.path().join("inscription.txt")).unwrap();
        let records: Vec<&str> = content.split('\n').skip(1).collect();
        assert_eq!(records.len(), CLIENTS);
        assert!(records
            .iter()
            .all(|record| record.split('\t').count() == 6));

        server.shutdown.send(()).unwrap();
        server.task.await.unwrap();
    }

    #[tokio::test]
    async fn idle_client_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let server = start(dir.path(), 4).await;

        let _idle = TcpStream::connect(server.addr).await.unwrap();

        assert_eq!(
            request(server.addr, r#"{"command":"CHARGER 3"}"#).await,
            [Response::courses(vec![])]
        );

        drop(_idle);
        server.shutdown.send(()).unwrap();
        server.task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_waits_for_running_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let server = start(dir.path(), 4).await;

        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        // give the listener a chance to accept the connection
        tokio::time::sleep(Duration::from_millis(200)).await;

        server.shutdown.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!server.task.is_finished());

        assert_eq!(
            send(&mut stream, r#"{"command":"CHARGER 2"}"#).await,
            [Response::courses(vec![Course::new(
                "INF202", "Networks", "Hiver"
            )])]
        );

        server.task.await.unwrap();
        assert!(TcpStream::connect(server.addr).await.is_err());
    }
}
