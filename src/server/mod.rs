// クライアント接続と卓の仲介
mod connection;
mod hub;
mod router;
mod session;

use std::sync::{mpsc, Arc};
use std::thread;

use crate::config::{init_card_cost, shutdown_card_cost, ServerConfig};
use crate::control::{DeskConfig, DeskRegistry};
use crate::error::ErrorCode;
use crate::model::*;
use crate::storage::{MemoryStorage, Storage};
use crate::util::jobs::Jobs;
use crate::util::misc::{sleep_ms, Res};
use crate::{debug, info, warn};

pub use connection::{listen, Connection, Message, TcpConnection, WsConnection};
pub use hub::Hub;
pub use router::Router;
pub use session::{Outbound, SessionRegistry};

// 全接続で共有する状態
pub struct ServerContext {
    pub sessions: Arc<SessionRegistry>,
    pub desks: Arc<DeskRegistry>,
    pub storage: Arc<dyn Storage>,
    pub jobs: Jobs,
    pub desk_cfg: DeskConfig,
    pub init_coin: i64,
}

impl ServerContext {
    pub fn new(conf: &ServerConfig, storage: Arc<dyn Storage>, jobs: Jobs) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new()),
            desks: Arc::new(DeskRegistry::new()),
            storage,
            jobs,
            desk_cfg: conf.desk_config(),
            init_coin: conf.init_coin,
        }
    }

    pub fn shutdown(&self) {
        self.sessions.kick_all("server shutdown");
        self.desks.shutdown();
    }
}

pub fn run(conf: &ServerConfig) -> Res {
    init_card_cost(conf.card_cost.clone());
    let ctx = Arc::new(ServerContext::new(
        conf,
        Arc::new(MemoryStorage::new()),
        Jobs::start(),
    ));

    let conns = listen(&conf.addr, conf.transport)?;
    for conn in conns {
        let ctx = ctx.clone();
        thread::spawn(move || serve(ctx, conn));
    }

    // 待ち受けが終了
    ctx.shutdown();
    shutdown_card_cost();
    info!("server stopped");
    Ok(())
}

fn send_frame(conn: &mut dyn Connection, frame: &ServerFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(s) => conn.send(&s),
        Err(e) => {
            warn!("frame serialize error: {}", e);
            true
        }
    }
}

// 1接続の処理. 切断まで戻らない
pub fn serve(ctx: Arc<ServerContext>, mut conn: Box<dyn Connection>) {
    let (tx, rx) = mpsc::channel();
    let mut router = Router::new(ctx, tx);

    'conn: loop {
        while let Ok(out) = rx.try_recv() {
            match out {
                Outbound::Frame(f) => {
                    if !send_frame(conn.as_mut(), &f) {
                        break 'conn;
                    }
                }
                Outbound::Kick(reason) => {
                    let f = ServerFrame::push(push::KICK, &KickPush { reason });
                    send_frame(conn.as_mut(), &f);
                    info!("{} kicked", conn.peer());
                    break 'conn;
                }
            }
        }

        match conn.recv() {
            Message::Text(text) => {
                debug!("{} <- {}", conn.peer(), text);
                let res = match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => router.handle(frame),
                    Err(e) => {
                        warn!("{}: invalid frame: {}", conn.peer(), e);
                        Some(ServerFrame::err("", None, ErrorCode::WrongType))
                    }
                };
                if let Some(f) = res {
                    if !send_frame(conn.as_mut(), &f) {
                        break;
                    }
                }
            }
            Message::Nop => sleep_ms(10),
            Message::Close => break,
        }
    }

    router.close();
    info!("{} disconnected", conn.peer());
}

#[test]
fn test_serve_tcp() {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    let conf = ServerConfig::default();
    let ctx = Arc::new(ServerContext::new(
        &conf,
        Arc::new(MemoryStorage::new()),
        Jobs::inline(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut client = TcpStream::connect(addr).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let (stream, _) = listener.accept().unwrap();
    let conn: Box<dyn Connection> = Box::new(TcpConnection::new(stream).unwrap());
    let c = ctx.clone();
    let server = thread::spawn(move || serve(c, conn));

    let mut reader = BufReader::new(client.try_clone().unwrap());
    let mut read_frame = || {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        serde_json::from_str::<ServerFrame>(&line).unwrap()
    };

    client.write_all(b"not json\n").unwrap();
    assert_eq!(read_frame().code(), ErrorCode::WrongType.code());

    client
        .write_all(b"{\"route\":\"User.Login\",\"id\":1,\"data\":{\"uid\":42}}\n")
        .unwrap();
    let res = read_frame();
    assert_eq!(res.code(), 0);
    assert_eq!(res.data()["uid"], serde_json::json!(42));
    assert!(ctx.sessions.is_online(42));

    // サーバー停止でonKickを受けて切断される
    ctx.shutdown();
    assert!(read_frame().is_push(push::KICK));
    server.join().unwrap();
    assert!(!ctx.sessions.is_online(42));
}
