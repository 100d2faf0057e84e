use std::fmt;
use std::io::prelude::*;
use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;

use crate::config::Transport;
use crate::util::misc::{sleep_ms, Res};
use crate::{error, info, warn};

#[derive(Debug, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Nop,
    Close,
}

// ノンブロッキングの接続. recvは受信がなければNopを返す
pub trait Connection: Send {
    fn send(&mut self, msg: &str) -> bool;
    fn recv(&mut self) -> Message;
    fn peer(&self) -> &str;
}

impl fmt::Debug for dyn Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dyn Connection({})", self.peer())
    }
}

// TCP
// メッセージを'\n'で区切るのでメッセージ自体に'\n'は含めることはできない
pub struct TcpConnection {
    stream: TcpStream,
    buf: Vec<u8>,
    peer: String,
}

impl TcpConnection {
    pub fn new(stream: TcpStream) -> Res<Self> {
        let peer = stream.peer_addr()?.to_string();
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            buf: vec![],
            peer,
        })
    }

    fn take_line(&mut self) -> Option<String> {
        let p = self.buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=p).collect();
        let text = String::from_utf8_lossy(&line[..p]);
        Some(text.trim_end_matches('\r').to_string())
    }
}

impl Connection for TcpConnection {
    fn send(&mut self, msg: &str) -> bool {
        let data = msg.to_string() + "\n";
        let mut bytes = data.as_bytes();
        while !bytes.is_empty() {
            match self.stream.write(bytes) {
                Ok(0) => return false,
                Ok(n) => bytes = &bytes[n..],
                Err(e) if e.kind() == ErrorKind::WouldBlock => sleep_ms(1),
                Err(e) => {
                    warn!("tcp send error: {}", e);
                    return false;
                }
            }
        }
        true
    }

    fn recv(&mut self) -> Message {
        if let Some(line) = self.take_line() {
            return Message::Text(line);
        }

        let mut chunk = [0u8; 4096];
        match self.stream.read(&mut chunk) {
            Ok(0) => {}
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                return self.take_line().map_or(Message::Nop, Message::Text);
            }
            Err(e) => {
                if e.kind() == ErrorKind::WouldBlock {
                    return Message::Nop;
                }
                error!("tcp error: {}", e);
            }
        }

        info!("tcp connection closed: {}", self.peer);
        Message::Close
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

// websocket
pub struct WsConnection {
    ws: tungstenite::protocol::WebSocket<TcpStream>,
    peer: String,
}

impl WsConnection {
    // ハンドシェイクはブロッキングで行う
    pub fn accept(stream: TcpStream) -> Res<Self> {
        let peer = stream.peer_addr()?.to_string();
        let ws = tungstenite::accept(stream).map_err(|e| format!("ws upgrade error: {}", e))?;
        ws.get_ref().set_nonblocking(true)?;
        Ok(Self { ws, peer })
    }
}

impl Connection for WsConnection {
    fn send(&mut self, msg: &str) -> bool {
        use tungstenite::error::Error as WsError;
        match self.ws.send(msg.into()) {
            Ok(()) => true,
            // 書き込みはバッファされて次のflushで送信される
            Err(WsError::Io(e)) if e.kind() == ErrorKind::WouldBlock => true,
            Err(e) => {
                warn!("ws send error: {}", e);
                false
            }
        }
    }

    fn recv(&mut self) -> Message {
        use tungstenite::error::Error as WsError;
        use tungstenite::protocol::Message as WsMessage;

        loop {
            match self.ws.read() {
                Ok(msg) => match msg {
                    WsMessage::Close(_) => {
                        self.ws.send(WsMessage::Close(None)).ok();
                        break;
                    }
                    WsMessage::Ping(ping) => {
                        self.ws.send(WsMessage::Pong(ping)).ok();
                    }
                    WsMessage::Text(text) => {
                        return Message::Text(text.as_str().to_string());
                    }
                    _ => {
                        warn!("ws unhandled message: {:?}", msg);
                    }
                },
                Err(WsError::Io(e)) if e.kind() == ErrorKind::WouldBlock => {
                    self.ws.flush().ok();
                    return Message::Nop;
                }
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => break,
                Err(e) => {
                    error!("ws error: {:?}", e);
                    break;
                }
            }
        }

        info!("ws connection closed: {}", self.peer);
        Message::Close
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

// 待ち受けを開始して確立した接続を順に返す
pub fn listen(addr: &str, transport: Transport) -> Res<mpsc::Receiver<Box<dyn Connection>>> {
    let listener = TcpListener::bind(addr)?;
    info!("listening on {} ({:?})", addr, transport);

    let (tx, rx) = mpsc::channel::<Box<dyn Connection>>();
    thread::spawn(move || {
        for request in listener.incoming() {
            let stream = match request {
                Ok(s) => s,
                Err(e) => {
                    error!("accept error: {}", e);
                    continue;
                }
            };
            let tx = tx.clone();
            thread::spawn(move || {
                let conn: Res<Box<dyn Connection>> = match transport {
                    Transport::Tcp => {
                        TcpConnection::new(stream).map(|c| Box::new(c) as Box<dyn Connection>)
                    }
                    Transport::Ws => {
                        WsConnection::accept(stream).map(|c| Box::new(c) as Box<dyn Connection>)
                    }
                };
                match conn {
                    Ok(c) => {
                        info!("connection opened from: {}", c.peer());
                        tx.send(c).ok();
                    }
                    Err(e) => error!("connection error: {}", e),
                }
            });
        }
    });
    Ok(rx)
}

#[cfg(test)]
fn recv_text(conn: &mut dyn Connection) -> Option<String> {
    for _ in 0..400 {
        match conn.recv() {
            Message::Text(t) => return Some(t),
            Message::Nop => sleep_ms(5),
            Message::Close => return None,
        }
    }
    None
}

#[test]
fn test_tcp_lines() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut client = TcpStream::connect(addr).unwrap();
    let (stream, _) = listener.accept().unwrap();
    let mut conn = TcpConnection::new(stream).unwrap();

    // 行の途中で分割されても結合される
    client.write_all(b"{\"a\":1}\n{\"b\"").unwrap();
    client.flush().unwrap();
    assert_eq!(recv_text(&mut conn).as_deref(), Some("{\"a\":1}"));
    client.write_all(b":2}\r\n").unwrap();
    client.flush().unwrap();
    assert_eq!(recv_text(&mut conn).as_deref(), Some("{\"b\":2}"));

    assert!(conn.send("pong"));
    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"pong\n");

    drop(client);
    assert_eq!(recv_text(&mut conn), None);
}
