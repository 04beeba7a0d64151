//! Tests for ClientCommandHandler
//!
//! These tests verify:
//! - Submission packing for every priority / background variant
//! - FIFO correlation of JOB_CREATED handles
//! - State guards on every work event
//! - Connection loss resets
//! - Payload encoder hooks

use bytes::{Bytes, BytesMut};
use gearwire::client::{
    ClientCommandHandler, DataEncoder, JobRequest, JobState, Priority, SharedRequest,
};
use gearwire::protocol::{Arguments, Codec, CommandType, Packet, Parsed};
use gearwire::{GearmanError, Result};

// =============================================================================
// Helper Functions
// =============================================================================

fn new_request(task: &str, unique: &str, data: &[u8]) -> SharedRequest {
    JobRequest::new(task, unique, Bytes::copy_from_slice(data)).shared()
}

/// Decode everything the handler queued for the server
fn sent_packets<E: DataEncoder>(handler: &mut ClientCommandHandler<E>) -> Vec<Packet> {
    let codec = Codec::default();
    let mut buffer = BytesMut::from(&handler.take_output()[..]);
    let mut packets = Vec::new();

    while let Some(parsed) = codec.decode_next(&mut buffer, false).unwrap() {
        match parsed {
            Parsed::Command(packet) => packets.push(packet),
            other => panic!("Expected command, got {:?}", other),
        }
    }
    assert!(buffer.is_empty());
    packets
}

fn job_created(handle: &str) -> Packet {
    Packet::new(
        CommandType::JobCreated,
        Arguments::new().with("handle", handle.to_string()),
    )
}

fn handle_data(command: CommandType, handle: &str, data: &[u8]) -> Packet {
    Packet::new(
        command,
        Arguments::new()
            .with("handle", handle.to_string())
            .with("data", Bytes::copy_from_slice(data)),
    )
}

fn submitted_handler(handle: &str) -> (ClientCommandHandler, SharedRequest) {
    let mut handler = ClientCommandHandler::new();
    let request = new_request("reverse", "u1", b"hello");
    handler.send_job_request(&request).unwrap();
    handler.handle_packet(&job_created(handle)).unwrap();
    handler.take_output();
    (handler, request)
}

fn assert_invalid_state(result: Result<bool>, expected: JobState, actual: Option<JobState>) {
    match result {
        Err(GearmanError::InvalidClientState {
            expected: e,
            actual: a,
            ..
        }) => {
            assert_eq!(e, expected);
            assert_eq!(a, actual);
        }
        other => panic!("Expected InvalidClientState, got {:?}", other),
    }
}

// =============================================================================
// Submission Tests
// =============================================================================

#[test]
fn test_reverse_job_lifecycle() {
    let mut handler = ClientCommandHandler::new();
    let request = new_request("reverse", "u1", b"hello");

    handler.send_job_request(&request).unwrap();

    let sent = sent_packets(&mut handler);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command_type().unwrap(), CommandType::SubmitJob);
    assert_eq!(sent[0].args.get_str("func").unwrap(), "reverse");
    assert_eq!(sent[0].args.get_str("unique").unwrap(), "u1");
    assert_eq!(sent[0].args.get("data").unwrap().as_ref(), b"hello");
    assert_eq!(request.lock().state, JobState::Pending);

    assert!(handler.handle_packet(&job_created("H:1")).unwrap());
    {
        let current = request.lock();
        assert_eq!(current.state, JobState::Created);
        assert_eq!(current.handle().unwrap().as_ref(), b"H:1");
    }

    handler
        .handle_packet(&handle_data(CommandType::WorkComplete, "H:1", b"olleh"))
        .unwrap();

    let current = request.lock();
    assert_eq!(current.state, JobState::Complete);
    assert_eq!(current.result.as_ref().unwrap().as_ref(), b"olleh");
}

#[test]
fn test_submit_variants_by_priority_and_background() {
    let cases = [
        (Priority::Normal, false, CommandType::SubmitJob),
        (Priority::Normal, true, CommandType::SubmitJobBg),
        (Priority::High, false, CommandType::SubmitJobHigh),
        (Priority::High, true, CommandType::SubmitJobHighBg),
        (Priority::Low, false, CommandType::SubmitJobLow),
        (Priority::Low, true, CommandType::SubmitJobLowBg),
    ];

    for (priority, background, expected) in cases {
        let mut handler = ClientCommandHandler::new();
        let request = JobRequest::new("task", "", "payload")
            .priority(priority)
            .background(background)
            .shared();

        handler.send_job_request(&request).unwrap();

        let sent = sent_packets(&mut handler);
        assert_eq!(sent[0].command_type().unwrap(), expected);
    }
}

#[test]
fn test_submit_requires_unknown_state() {
    let (mut handler, request) = submitted_handler("H:1");

    let result = handler.send_job_request(&request).map(|_| true);

    assert_invalid_state(result, JobState::Unknown, Some(JobState::Created));
    assert!(!handler.has_output());
    assert_eq!(handler.pending_count(), 0);
}

#[test]
fn test_submit_binary_payload() {
    let mut handler = ClientCommandHandler::new();
    let data: [u8; 4] = [0x00, 0x10, 0x00, 0xFF];
    let request = new_request("bin", "u", &data);

    handler.send_job_request(&request).unwrap();

    let sent = sent_packets(&mut handler);
    assert_eq!(sent[0].args.get("data").unwrap().as_ref(), &data[..]);
}

#[test]
fn test_get_status_of_job() {
    let (mut handler, request) = submitted_handler("H:42");

    handler.send_get_status_of_job(&request).unwrap();

    let sent = sent_packets(&mut handler);
    assert_eq!(sent[0].command_type().unwrap(), CommandType::GetStatus);
    assert_eq!(sent[0].args.get_str("handle").unwrap(), "H:42");
}

#[test]
fn test_get_status_without_handle() {
    let mut handler = ClientCommandHandler::new();
    let request = new_request("reverse", "u1", b"hello");

    let result = handler.send_get_status_of_job(&request).map(|_| true);

    assert_invalid_state(result, JobState::Created, Some(JobState::Unknown));
}

// =============================================================================
// Handle Correlation Tests
// =============================================================================

#[test]
fn test_fifo_handle_correlation() {
    let mut handler = ClientCommandHandler::new();
    let requests: Vec<SharedRequest> = (0..4)
        .map(|i| new_request("task", &format!("u{}", i), b"x"))
        .collect();

    for request in &requests {
        handler.send_job_request(request).unwrap();
    }
    assert_eq!(handler.pending_count(), 4);

    handler.handle_packet(&job_created("H:a")).unwrap();
    handler
        .handle_packet(&handle_data(CommandType::WorkData, "H:a", b"early"))
        .unwrap();
    handler.handle_packet(&job_created("H:b")).unwrap();
    handler
        .handle_packet(&handle_data(CommandType::WorkComplete, "H:a", b"done"))
        .unwrap();
    handler.handle_packet(&job_created("H:c")).unwrap();
    handler.handle_packet(&job_created("H:d")).unwrap();

    let expected = ["H:a", "H:b", "H:c", "H:d"];
    for (request, handle) in requests.iter().zip(expected) {
        assert_eq!(request.lock().handle().unwrap().as_ref(), handle.as_bytes());
    }
    assert_eq!(requests[0].lock().state, JobState::Complete);
    assert_eq!(requests[0].lock().data_updates, vec![Bytes::from("early")]);
    assert_eq!(requests[1].lock().state, JobState::Created);
    assert_eq!(handler.pending_count(), 0);
    assert_eq!(handler.created_count(), 4);
    assert!(handler.request_for_handle(b"H:c").is_some());
}

#[test]
fn test_job_created_without_pending_request() {
    let mut handler = ClientCommandHandler::new();

    let result = handler.handle_packet(&job_created("H:1"));

    assert_invalid_state(result, JobState::Pending, None);
}

#[test]
fn test_job_created_for_request_reset_elsewhere() {
    let mut handler = ClientCommandHandler::new();
    let request = new_request("reverse", "u1", b"hello");
    handler.send_job_request(&request).unwrap();

    // Caller tampered with the request after submission
    request.lock().state = JobState::Unknown;

    let result = handler.recv_job_created(Bytes::from_static(b"H:1"));

    assert_invalid_state(result, JobState::Pending, Some(JobState::Unknown));
}

// =============================================================================
// Work Event Tests
// =============================================================================

#[test]
fn test_work_data_and_warnings_accumulate() {
    let (mut handler, request) = submitted_handler("H:1");

    let chunks: [&[u8]; 3] = [b"one", b"two\0", b"three"];
    for chunk in chunks {
        handler
            .handle_packet(&handle_data(CommandType::WorkData, "H:1", chunk))
            .unwrap();
    }
    handler
        .handle_packet(&handle_data(CommandType::WorkWarning, "H:1", b"careful"))
        .unwrap();

    let current = request.lock();
    assert_eq!(
        current.data_updates,
        vec![
            Bytes::from_static(b"one"),
            Bytes::from_static(b"two\0"),
            Bytes::from_static(b"three")
        ]
    );
    assert_eq!(current.warning_updates, vec![Bytes::from_static(b"careful")]);
    assert_eq!(current.state, JobState::Created);
}

#[test]
fn test_work_status_parses_floats() {
    let (mut handler, request) = submitted_handler("H:1");
    let status = |numerator: &str, denominator: &str| {
        Packet::new(
            CommandType::WorkStatus,
            Arguments::new()
                .with("handle", "H:1")
                .with("numerator", numerator.to_string())
                .with("denominator", denominator.to_string()),
        )
    };

    handler.handle_packet(&status("1", "4")).unwrap();
    handler.handle_packet(&status("2.5", "4")).unwrap();

    assert_eq!(request.lock().status_updates, vec![(1.0, 4.0), (2.5, 4.0)]);

    let result = handler.handle_packet(&status("half", "4"));
    assert!(matches!(
        result,
        Err(GearmanError::InvalidNumber {
            field: "numerator",
            ..
        })
    ));
}

#[test]
fn test_work_fail() {
    let (mut handler, request) = submitted_handler("H:1");

    handler
        .handle_packet(&Packet::new(
            CommandType::WorkFail,
            Arguments::new().with("handle", "H:1"),
        ))
        .unwrap();

    let current = request.lock();
    assert_eq!(current.state, JobState::Failed);
    assert!(current.result.is_none());
}

#[test]
fn test_work_exception_keeps_state() {
    let (mut handler, request) = submitted_handler("H:1");

    handler
        .handle_packet(&handle_data(CommandType::WorkException, "H:1", b"boom"))
        .unwrap();

    {
        let current = request.lock();
        assert_eq!(current.state, JobState::Created);
        assert_eq!(current.exception.as_ref().unwrap().as_ref(), b"boom");
    }

    handler
        .handle_packet(&Packet::new(
            CommandType::WorkFail,
            Arguments::new().with("handle", "H:1"),
        ))
        .unwrap();
    assert_eq!(request.lock().state, JobState::Failed);
}

#[test]
fn test_status_res_snapshot() {
    let (mut handler, request) = submitted_handler("H:1");
    let status_res = |known: &str, running: &str| {
        Packet::new(
            CommandType::StatusRes,
            Arguments::new()
                .with("handle", "H:1")
                .with("known", known.to_string())
                .with("running", running.to_string())
                .with("numerator", "3")
                .with("denominator", "10"),
        )
    };

    handler.handle_packet(&status_res("1", "0")).unwrap();
    {
        let current = request.lock();
        let status = current.server_status.as_ref().unwrap();
        assert!(status.known);
        assert!(!status.running);
        assert_eq!(status.numerator, 3.0);
        assert_eq!(status.denominator, 10.0);
        assert_eq!(status.handle.as_ref(), b"H:1");
    }

    // Only the literal "1" counts as true; the snapshot is overwritten
    handler.handle_packet(&status_res("true", "1")).unwrap();
    let current = request.lock();
    let status = current.server_status.as_ref().unwrap();
    assert!(!status.known);
    assert!(status.running);
}

// =============================================================================
// State Guard Tests
// =============================================================================

/// Every event that needs a CREATED job
fn work_events(handle: &str) -> Vec<Packet> {
    vec![
        handle_data(CommandType::WorkData, handle, b"late"),
        handle_data(CommandType::WorkWarning, handle, b"late"),
        handle_data(CommandType::WorkComplete, handle, b"again"),
        handle_data(CommandType::WorkException, handle, b"late"),
        Packet::new(CommandType::WorkFail, Arguments::new().with("handle", handle.to_string())),
        Packet::new(
            CommandType::WorkStatus,
            Arguments::new()
                .with("handle", handle.to_string())
                .with("numerator", "1")
                .with("denominator", "2"),
        ),
        Packet::new(
            CommandType::StatusRes,
            Arguments::new()
                .with("handle", handle.to_string())
                .with("known", "1")
                .with("running", "1")
                .with("numerator", "1")
                .with("denominator", "2"),
        ),
    ]
}

#[test]
fn test_work_events_rejected_after_complete() {
    let (mut handler, _request) = submitted_handler("H:1");
    handler
        .handle_packet(&handle_data(CommandType::WorkComplete, "H:1", b"done"))
        .unwrap();

    for event in &work_events("H:1") {
        assert_invalid_state(
            handler.handle_packet(event),
            JobState::Created,
            Some(JobState::Complete),
        );
    }
}

#[test]
fn test_work_events_rejected_after_fail() {
    let (mut handler, request) = submitted_handler("H:1");
    handler
        .handle_packet(&Packet::new(
            CommandType::WorkFail,
            Arguments::new().with("handle", "H:1"),
        ))
        .unwrap();

    for event in &work_events("H:1") {
        assert_invalid_state(
            handler.handle_packet(event),
            JobState::Created,
            Some(JobState::Failed),
        );
    }

    let current = request.lock();
    assert_eq!(current.state, JobState::Failed);
    assert!(current.result.is_none());
    assert!(current.data_updates.is_empty());
}

#[test]
fn test_work_event_for_unknown_handle() {
    let (mut handler, _request) = submitted_handler("H:1");

    let result = handler.handle_packet(&handle_data(CommandType::WorkData, "H:404", b"x"));

    match result {
        Err(GearmanError::UnknownHandle(handle)) => assert_eq!(handle, "H:404"),
        other => panic!("Expected UnknownHandle, got {:?}", other),
    }
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[test]
fn test_server_error_packet() {
    let mut handler = ClientCommandHandler::new();
    let packet = Packet::new(
        CommandType::Error,
        Arguments::new()
            .with("err_code", "ERR_QUEUE_FULL")
            .with("err_text", "queue is full"),
    );

    match handler.handle_packet(&packet) {
        Err(GearmanError::Server { code, text }) => {
            assert_eq!(code, "ERR_QUEUE_FULL");
            assert_eq!(text, "queue is full");
        }
        other => panic!("Expected Server error, got {:?}", other),
    }
}

#[test]
fn test_echo_res_is_acknowledged() {
    let mut handler = ClientCommandHandler::new();
    let packet = Packet::new(CommandType::EchoRes, Arguments::new().with("text", "ping"));

    assert!(handler.handle_packet(&packet).unwrap());
}

#[test]
fn test_worker_commands_are_unexpected() {
    let mut handler = ClientCommandHandler::new();

    let result = handler.handle_packet(&Packet::new(CommandType::Noop, Arguments::new()));

    assert!(matches!(result, Err(GearmanError::UnexpectedCommand("NOOP"))));
}

// =============================================================================
// Connection Lifecycle Tests
// =============================================================================

#[test]
fn test_connection_lost_resets_requests() {
    let mut handler = ClientCommandHandler::new();
    let created = new_request("task", "a", b"1");
    let pending = new_request("task", "b", b"2");

    handler.on_connection_established();
    handler.send_job_request(&created).unwrap();
    handler.send_job_request(&pending).unwrap();
    handler.handle_packet(&job_created("H:old")).unwrap();

    handler.on_connection_lost();

    assert_eq!(created.lock().state, JobState::Unknown);
    assert_eq!(pending.lock().state, JobState::Unknown);
    assert_eq!(handler.pending_count(), 0);
    assert_eq!(handler.created_count(), 0);
    assert!(!handler.has_output());

    // Stale handles are gone
    let result = handler.handle_packet(&handle_data(CommandType::WorkData, "H:old", b"x"));
    assert!(matches!(result, Err(GearmanError::UnknownHandle(_))));
}

#[test]
fn test_resubmit_after_connection_error() {
    let mut handler = ClientCommandHandler::new();
    let first = new_request("task", "a", b"1");
    let second = new_request("task", "b", b"2");

    handler.send_job_request(&first).unwrap();
    handler.on_connection_error();

    handler.send_job_request(&second).unwrap();
    handler.send_job_request(&first).unwrap();
    handler.handle_packet(&job_created("H:new1")).unwrap();
    handler.handle_packet(&job_created("H:new2")).unwrap();

    assert_eq!(second.lock().handle().unwrap().as_ref(), b"H:new1");
    assert_eq!(first.lock().handle().unwrap().as_ref(), b"H:new2");
}

// =============================================================================
// Encoder Tests
// =============================================================================

/// Prefixes outgoing data and strips the prefix from incoming data
struct TaggedEncoder;

impl DataEncoder for TaggedEncoder {
    fn encode(&self, data: Bytes) -> Result<Bytes> {
        let mut tagged = b"tag:".to_vec();
        tagged.extend_from_slice(&data);
        Ok(Bytes::from(tagged))
    }

    fn decode(&self, data: Bytes) -> Result<Bytes> {
        data.strip_prefix(b"tag:")
            .map(Bytes::copy_from_slice)
            .ok_or_else(|| GearmanError::Encoding("missing tag".to_string()))
    }
}

#[test]
fn test_custom_encoder() {
    let mut handler = ClientCommandHandler::with_encoder(TaggedEncoder);
    let request = new_request("reverse", "u1", b"hello");

    handler.send_job_request(&request).unwrap();
    let sent = sent_packets(&mut handler);
    assert_eq!(sent[0].args.get("data").unwrap().as_ref(), b"tag:hello");

    handler.handle_packet(&job_created("H:1")).unwrap();
    handler
        .handle_packet(&handle_data(CommandType::WorkData, "H:1", b"tag:part"))
        .unwrap();
    handler
        .handle_packet(&handle_data(CommandType::WorkComplete, "H:1", b"tag:olleh"))
        .unwrap();

    let current = request.lock();
    assert_eq!(current.data_updates, vec![Bytes::from_static(b"part")]);
    assert_eq!(current.result.as_ref().unwrap().as_ref(), b"olleh");
    // The request keeps the caller's original data
    assert_eq!(current.job.data.as_ref(), b"hello");
}

#[test]
fn test_encoder_failure_leaves_request_untouched() {
    let mut handler = ClientCommandHandler::with_encoder(TaggedEncoder);
    let request = new_request("reverse", "u1", b"hello");
    handler.send_job_request(&request).unwrap();
    handler.handle_packet(&job_created("H:1")).unwrap();

    let result = handler.handle_packet(&handle_data(CommandType::WorkComplete, "H:1", b"raw"));

    assert!(matches!(result, Err(GearmanError::Encoding(_))));
    assert_eq!(request.lock().state, JobState::Created);
}
