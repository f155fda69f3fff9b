use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};

use crabgate::control::{codec, ControlMessage};
use crabgate::wire::HEADER_LEN;

// -----------------------------------------------------------------------------
// ----- Frame builders --------------------------------------------------------

fn frame(version: u8, opcode: u8, stream: u16, body: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(HEADER_LEN + body.len());
    raw.push(version);
    raw.push(0); // flags
    raw.extend_from_slice(&stream.to_be_bytes());
    raw.push(opcode);
    raw.extend_from_slice(&(body.len() as u32).to_be_bytes());
    raw.extend_from_slice(body);
    raw
}

#[allow(dead_code)]
pub fn request_frame(opcode: u8, stream: u16, body: &[u8]) -> Vec<u8> {
    frame(0x04, opcode, stream, body)
}

#[allow(dead_code)]
pub fn response_frame(opcode: u8, stream: u16, body: &[u8]) -> Vec<u8> {
    frame(0x84, opcode, stream, body)
}

// -----------------------------------------------------------------------------
// ----- Sockets ---------------------------------------------------------------

/// Connected loopback pair: (connecting end, accepted end).
#[allow(dead_code)]
pub async fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().unwrap();

    let (connected, accepted) = tokio::join!(TcpStream::connect(addr), async {
        listener.accept().await.map(|(stream, _)| stream)
    });

    (connected.expect("connect"), accepted.expect("accept"))
}

// -----------------------------------------------------------------------------
// ----- Control frames --------------------------------------------------------

#[allow(dead_code)]
pub async fn read_control_frame<R>(reader: &mut R) -> ControlMessage
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; codec::LENGTH_PREFIX_LEN];
    reader.read_exact(&mut prefix).await.expect("length prefix");

    let mut body = vec![0u8; u32::from_be_bytes(prefix) as usize];
    reader.read_exact(&mut body).await.expect("message body");

    codec::decode(&body).expect("decodable control message")
}
