use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    thread,
    time::{Duration, Instant},
};

use simlink_core::{
    link::{encode, FrameDecoder, Link, TransportError},
    message::Message,
};
use simlink_link_tcp::{Tcp, TcpOption};

fn read_message(stream: &mut TcpStream, decoder: &mut FrameDecoder) -> anyhow::Result<Message> {
    let mut buf = [0u8; 1024];
    loop {
        if let Some(msg) = decoder.next_frame()? {
            return Ok(msg);
        }
        let n = stream.read(&mut buf)?;
        anyhow::ensure!(n > 0, "client hung up");
        decoder.extend(&buf[..n]);
    }
}

fn spawn_host<F>(f: F) -> anyhow::Result<(std::net::SocketAddr, thread::JoinHandle<()>)>
where
    F: FnOnce(TcpStream) -> anyhow::Result<()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        f(stream).expect("host");
    });
    Ok((addr, handle))
}

#[test]
fn send_receive() -> anyhow::Result<()> {
    let (addr, host) = spawn_host(|mut stream| {
        let mut decoder = FrameDecoder::new();
        let msg = read_message(&mut stream, &mut decoder)?;
        assert_eq!("FPSLimit", msg.ty());
        assert_eq!(Ok(60), msg.field::<i64>("fps"));
        stream.write_all(&encode(&Message::new("SetFPSLimit"))?)?;
        Ok(())
    })?;

    let mut link = Tcp::connect(addr, TcpOption::default())?;
    assert!(link.is_open());
    assert_eq!(addr, link.addr());

    link.send(&Message::new("FPSLimit").with("fps", 60))?;
    assert_eq!(
        Message::new("SetFPSLimit"),
        link.receive(Duration::from_secs(5))?
    );

    host.join().expect("host thread");
    link.close()?;
    assert!(!link.is_open());
    assert_eq!(
        Err(TransportError::ConnectionClosed),
        link.send(&Message::new("Hello"))
    );
    Ok(())
}

#[test]
fn split_frame_is_reassembled() -> anyhow::Result<()> {
    let ack = Message::new("PolledSensor").with("data", vec![7u8; 4096]);
    let expect = ack.clone();
    let (addr, host) = spawn_host(move |mut stream| {
        let frame = encode(&ack)?;
        let (head, tail) = frame.split_at(3);
        stream.write_all(head)?;
        stream.flush()?;
        thread::sleep(Duration::from_millis(50));
        stream.write_all(tail)?;
        thread::sleep(Duration::from_millis(100));
        Ok(())
    })?;

    let mut link = Tcp::connect(addr, TcpOption::default())?;
    assert_eq!(expect, link.receive(Duration::from_secs(5))?);

    host.join().expect("host thread");
    Ok(())
}

#[test]
fn timeout_keeps_link_open() -> anyhow::Result<()> {
    let (addr, host) = spawn_host(|stream| {
        thread::sleep(Duration::from_millis(300));
        drop(stream);
        Ok(())
    })?;

    let mut link = Tcp::connect(addr, TcpOption::default())?;
    let start = Instant::now();
    assert_eq!(
        Err(TransportError::Timeout(Duration::from_millis(100))),
        link.receive(Duration::from_millis(100))
    );
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(link.is_open());

    host.join().expect("host thread");
    Ok(())
}

#[test]
fn disconnect_closes_link() -> anyhow::Result<()> {
    let (addr, host) = spawn_host(|stream| {
        drop(stream);
        Ok(())
    })?;

    let mut link = Tcp::connect(addr, TcpOption::default())?;
    host.join().expect("host thread");

    assert!(matches!(
        link.receive(Duration::from_secs(5)),
        Err(TransportError::Disconnected(_))
    ));
    assert!(!link.is_open());
    assert_eq!(
        Err(TransportError::ConnectionClosed),
        link.receive(Duration::from_secs(1))
    );
    assert_eq!(Err(TransportError::ConnectionClosed), link.ensure_is_open());
    Ok(())
}
