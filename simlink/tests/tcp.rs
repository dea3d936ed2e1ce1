use std::{thread, time::Duration};

use simlink::prelude::*;
use simlink_host_emulator::{EmulatorOption, EmulatorServer, HostEmulator};
use simlink_link_tcp::{Tcp, TcpOption};

fn serve(dir: &std::path::Path) -> anyhow::Result<EmulatorServer> {
    Ok(EmulatorServer::spawn(HostEmulator::new(EmulatorOption {
        shm_dir: dir.to_path_buf(),
        ..Default::default()
    }))?)
}

fn connect(server: &EmulatorServer, dir: &std::path::Path) -> anyhow::Result<Connection<Tcp>> {
    Ok(Connection::open(
        Tcp::connect(server.addr(), TcpOption::default())?,
        ConnectionOption {
            shm_dir: dir.to_path_buf(),
            ..Default::default()
        },
    )?)
}

#[test]
fn sensors_over_tcp() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = serve(dir.path())?;
    let connection = connect(&server, dir.path())?;
    assert_eq!(server.addr().to_string(), connection.endpoint());

    let us = Ultrasonic::open(&connection, "front", "ego", SensorConfig::default())?;
    assert_eq!(1.5, us.poll()?.distance);

    let id = us.send_ad_hoc_poll_request()?;
    assert!(!us.is_ad_hoc_poll_request_ready(id)?);
    assert!(server.emulator().mark_ready(id.get()));
    assert_eq!(1.5, us.collect_ad_hoc_poll_request(id)?.distance);

    let imu = AdvancedImu::open(&connection, "imu", "ego", SensorConfig::default(), 2)?;
    let sample = ImuSample {
        time: 0.5,
        acc: [0.0, 0.0, -9.81],
        gyro: [0.0; 3],
    };
    server
        .emulator()
        .sensor_mut("ego", "imu")
        .map(|s| s.set_bulk(sample.to_le_bytes().to_vec()));
    assert_eq!(vec![sample], imu.poll()?);

    imu.remove()?;
    us.remove()?;
    assert_eq!(0, server.emulator().num_sensors());

    connection.close()?;
    server.shutdown();
    Ok(())
}

#[test]
fn settings_over_tcp() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = serve(dir.path())?;
    let connection = connect(&server, dir.path())?;

    let settings = connection.settings();
    settings.set_deterministic()?;
    settings.set_steps_per_second(60)?;
    assert!(server.emulator().is_deterministic());
    assert_eq!(Some(60), server.emulator().steps_per_second());

    connection.logging("ego").start("/tmp/vsl")?;
    assert_eq!(
        Some(true),
        server.emulator().vsl("ego").map(|vsl| vsl.logging())
    );
    Ok(())
}

#[test]
fn host_disconnect_closes_connection() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = serve(dir.path())?;
    let connection = connect(&server, dir.path())?;

    server.disconnect_client();
    thread::sleep(Duration::from_millis(100));
    assert!(matches!(
        connection.call(Message::new("RemoveFPSLimit"), "RemovedFPSLimit"),
        Err(SimError::Transport(TransportError::Disconnected(_)))
    ));
    assert!(!connection.is_open());
    assert_eq!(
        Err(SimError::Transport(TransportError::ConnectionClosed)),
        connection
            .call(Message::new("RemoveFPSLimit"), "RemovedFPSLimit")
            .map(|_| ())
    );
    Ok(())
}

#[test]
fn stalled_host_times_out() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = serve(dir.path())?;
    let connection = connect(&server, dir.path())?;

    server.emulator().stall(true);
    assert_eq!(
        Err(SimError::Protocol(ProtocolError::CommandTimeout {
            command: "RemoveFPSLimit".to_owned(),
            timeout: Duration::from_millis(100),
        })),
        connection
            .call_with_timeout(
                Message::new("RemoveFPSLimit"),
                "RemovedFPSLimit",
                Duration::from_millis(100)
            )
            .map(|_| ())
    );
    assert!(connection.is_open());

    server.emulator().stall(false);
    assert_eq!(
        Ok(()),
        connection
            .call(Message::new("RemoveFPSLimit"), "RemovedFPSLimit")
            .map(|_| ())
    );
    Ok(())
}

#[test]
fn late_ack_is_not_taken_for_next_reply() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = serve(dir.path())?;
    let connection = Connection::open(
        Tcp::connect(server.addr(), TcpOption::default())?,
        ConnectionOption {
            timeout: Duration::from_millis(100),
            shm_dir: dir.path().to_path_buf(),
            ..Default::default()
        },
    )?;
    let priority = |update_priority| SensorConfig {
        update_priority,
        ..Default::default()
    };
    let a = Ultrasonic::open(&connection, "a", "ego", priority(0.9))?;
    let b = Ultrasonic::open(&connection, "b", "ego", priority(0.1))?;

    server.emulator().stall(true);
    assert!(matches!(
        a.get_property(Property::UpdatePriority),
        Err(SimError::Protocol(ProtocolError::CommandTimeout { .. }))
    ));
    server.emulator().stall(false);
    thread::sleep(Duration::from_millis(50));

    assert_eq!(Value::Float(0.1), b.get_property(Property::UpdatePriority)?);
    assert_eq!(Value::Float(0.9), a.get_property(Property::UpdatePriority)?);
    assert!(connection.is_open());
    Ok(())
}
