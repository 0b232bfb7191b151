use crate::error::codec::CodecError;
use crate::transaction::{FrameLimits, Opcode, Transaction};

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

fn limits() -> FrameLimits {
    FrameLimits::new(Duration::from_millis(500), 1024 * 1024)
}

/// **VALUE**: Verifies a frame with empty and large fields crosses a real socket intact.
///
/// **WHY THIS MATTERS**: Empty strings and empty blobs are legal arguments; a framing
/// layer that treats a zero length as end of stream would hang or drop them.
///
/// **BUG THIS CATCHES**: Would catch partial writes or reads on payloads larger than the
/// socket buffer.
#[tokio::test]
async fn given_frame_with_edge_sized_fields_when_sent_over_socket_then_received_intact() {
    // GIVEN: A socket pair and a frame with an empty string, empty blob and large blob
    let (mut left, mut right) = UnixStream::pair().unwrap();
    let large = vec![0xA5u8; 300 * 1024];
    let mut trans = Transaction::new();
    trans
        .put_command(Opcode::Reply)
        .put("")
        .put(&Vec::<u8>::new())
        .put(&large);

    // WHEN: Writing on one end and reading on the other
    let limits = limits();
    let (written, read) = tokio::join!(
        trans.write_to(&mut left, &limits),
        Transaction::read_from(&mut right, &limits)
    );
    written.unwrap();
    let mut received = read.unwrap();

    // THEN: Every field is as sent
    assert_eq!(received.get_command().unwrap(), Opcode::Reply);
    assert_eq!(received.get::<String>().unwrap(), "");
    assert!(received.get::<Vec<u8>>().unwrap().is_empty());
    assert_eq!(received.get::<Vec<u8>>().unwrap(), large);
}

/// **VALUE**: Verifies that a length header above the limit is refused before allocation.
///
/// **WHY THIS MATTERS**: Any local process can connect; a 4 GiB length must not make the
/// broker try to allocate 4 GiB.
///
/// **BUG THIS CATCHES**: Would catch the limit check being applied after `vec![0; len]`.
#[tokio::test]
async fn given_oversized_length_header_when_reading_then_frame_too_large() {
    // GIVEN: A peer announcing a frame far above the limit
    let (mut left, mut right) = UnixStream::pair().unwrap();
    left.write_all(&u32::MAX.to_le_bytes()).await.unwrap();

    // WHEN: Reading a frame
    let result = Transaction::read_from(&mut right, &limits()).await;

    // THEN: FrameTooLarge, which is a transport error
    match result {
        Err(error @ CodecError::FrameTooLarge { .. }) => assert!(error.is_transport()),
        other => panic!("expected FrameTooLarge, got {other:?}"),
    }
}

/// **VALUE**: Verifies that the writer refuses to send frames above the limit.
///
/// **WHY THIS MATTERS**: The peer would reject the frame anyway and drop the connection.
///
/// **BUG THIS CATCHES**: Would catch the limit only being enforced on the read side.
#[tokio::test]
async fn given_payload_above_limit_when_writing_then_frame_too_large() {
    // GIVEN: A tiny limit and a larger payload
    let (mut left, _right) = UnixStream::pair().unwrap();
    let tight = FrameLimits::new(Duration::from_millis(500), 8);
    let mut trans = Transaction::new();
    trans.put("more than eight bytes");

    // WHEN: Writing it
    let result = trans.write_to(&mut left, &tight).await;

    // THEN: Refused
    assert!(matches!(result, Err(CodecError::FrameTooLarge { limit: 8, .. })));
}

/// **VALUE**: Verifies that a stalled frame fails with a timeout.
///
/// **WHY THIS MATTERS**: The dispatcher is single threaded; a peer that sends a header
/// and stops must not freeze every other client.
///
/// **BUG THIS CATCHES**: Would catch the deadline covering only the header read.
#[tokio::test]
async fn given_peer_stalls_mid_frame_when_reading_then_timeout() {
    // GIVEN: A peer that announces 16 bytes and sends 2
    let (mut left, mut right) = UnixStream::pair().unwrap();
    left.write_all(&16u32.to_le_bytes()).await.unwrap();
    left.write_all(&[1, 2]).await.unwrap();
    let short = FrameLimits::new(Duration::from_millis(50), 1024);

    // WHEN: Reading
    let result = Transaction::read_from(&mut right, &short).await;

    // THEN: Timeout
    assert!(matches!(result, Err(CodecError::Timeout { .. })));
}

/// **VALUE**: Verifies that an idle connection read waits past the deadline for the first
/// byte.
///
/// **WHY THIS MATTERS**: Reader tasks sit on idle clients for hours; only a started frame
/// is bounded.
///
/// **BUG THIS CATCHES**: Would catch `read_when_ready` applying the deadline from the start.
#[tokio::test]
async fn given_idle_peer_when_reading_when_ready_then_waits_beyond_deadline() {
    // GIVEN: A 30ms deadline and a peer that writes after 100ms
    let (mut left, mut right) = UnixStream::pair().unwrap();
    let short = FrameLimits::new(Duration::from_millis(30), 1024);
    let mut trans = Transaction::new();
    trans.put(&5u32);

    // WHEN: Reading while the peer delays
    let writer = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trans.write_to(&mut left, &short).await
    };
    let (written, read) = tokio::join!(writer, Transaction::read_when_ready(&mut right, &short));
    written.unwrap();

    // THEN: The frame is read
    assert_eq!(read.unwrap().get::<u32>().unwrap(), 5);
}

/// **VALUE**: Verifies that a closed peer reads as `Closed`, not as a generic IO error.
///
/// **WHY THIS MATTERS**: Reader tasks turn `Closed` into a quiet teardown.
///
/// **BUG THIS CATCHES**: Would catch `UnexpectedEof` no longer being mapped to `Closed`.
#[tokio::test]
async fn given_peer_closed_when_reading_then_closed_error() {
    // GIVEN: A peer that hangs up
    let (left, mut right) = UnixStream::pair().unwrap();
    drop(left);

    // WHEN: Reading
    let result = Transaction::read_when_ready(&mut right, &limits()).await;

    // THEN: Closed
    assert!(matches!(result, Err(CodecError::Closed { .. })));
}
