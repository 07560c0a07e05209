use smallvec::smallvec;

use crate::error::CanonicalError;
use crate::protocol::anthropic::{AnthropicContentBlock, AnthropicDelta, AnthropicStreamEvent};
use crate::protocol::canonical::{
    FunctionArguments, FunctionCallDelta, ResponseDelta, ResultDelta, StreamChunk,
};
use crate::protocol::mapping::{anthropic_finish_to_canonical, anthropic_usage_delta};

/// Parse an Anthropic SSE named event into a typed stream event.
///
/// Anthropic uses named events: `event: message_start\ndata: {...}\n\n`.
/// Unknown event names yield `Ok(None)` so newer event types pass through.
///
/// # Errors
///
/// Returns [`CanonicalError::BackendProtocol`] when a known event's payload
/// does not match its schema.
pub fn parse_anthropic_sse(
    event_type: &str,
    data: &[u8],
) -> Result<Option<AnthropicStreamEvent>, CanonicalError> {
    match event_type {
        "message_start"
        | "content_block_start"
        | "content_block_delta"
        | "content_block_stop"
        | "message_delta"
        | "message_stop"
        | "ping"
        | "error" => serde_json::from_slice(data).map(Some).map_err(|e| {
            CanonicalError::protocol(format!("malformed anthropic {event_type} event: {e}"))
        }),
        other => {
            tracing::debug!(event = other, "ignoring unknown anthropic stream event");
            Ok(None)
        }
    }
}

fn single_result(result: ResultDelta) -> StreamChunk {
    StreamChunk::Delta(ResponseDelta {
        remote_id: None,
        results: smallvec![result],
        usage: None,
    })
}

fn call_delta(index: u32, delta: FunctionCallDelta) -> StreamChunk {
    single_result(ResultDelta {
        function_calls: vec![FunctionCallDelta {
            index: Some(index),
            ..delta
        }],
        ..Default::default()
    })
}

/// Decode one Anthropic stream event into a canonical stream chunk.
///
/// # Errors
///
/// Returns [`CanonicalError::Upstream`] for `error` events,
/// [`CanonicalError::ContentPolicy`] for a `refusal` stop reason and
/// [`CanonicalError::BackendProtocol`] for an unknown stop reason.
pub fn decode_anthropic_stream_event(
    event: &AnthropicStreamEvent,
) -> Result<StreamChunk, CanonicalError> {
    Ok(match event {
        AnthropicStreamEvent::MessageStart { message } => StreamChunk::Delta(ResponseDelta {
            remote_id: Some(message.id.clone()),
            results: smallvec![],
            usage: message
                .usage
                .map(|u| anthropic_usage_delta(u.input_tokens, u.output_tokens)),
        }),
        AnthropicStreamEvent::ContentBlockStart {
            index,
            content_block,
        } => match content_block {
            AnthropicContentBlock::Text { text } if !text.is_empty() => {
                single_result(ResultDelta {
                    content: Some(text.clone()),
                    ..Default::default()
                })
            }
            AnthropicContentBlock::ToolUse { id, name, .. } => call_delta(
                *index,
                FunctionCallDelta {
                    id: Some(id.clone()),
                    name: Some(name.clone()),
                    ..Default::default()
                },
            ),
            AnthropicContentBlock::ToolResult { .. } => {
                return Err(CanonicalError::protocol(
                    "anthropic stream opened a tool_result block",
                ));
            }
            _ => StreamChunk::Ignored,
        },
        AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
            AnthropicDelta::TextDelta { text } => single_result(ResultDelta {
                content: Some(text.clone()),
                ..Default::default()
            }),
            AnthropicDelta::InputJsonDelta { partial_json } => call_delta(
                *index,
                FunctionCallDelta {
                    arguments: Some(FunctionArguments::Raw(partial_json.clone())),
                    ..Default::default()
                },
            ),
            AnthropicDelta::ThinkingDelta { .. } | AnthropicDelta::SignatureDelta { .. } => {
                StreamChunk::Ignored
            }
        },
        AnthropicStreamEvent::MessageDelta { delta, usage } => {
            let finish_reason = delta
                .stop_reason
                .as_deref()
                .map(anthropic_finish_to_canonical)
                .transpose()?;
            StreamChunk::Delta(ResponseDelta {
                remote_id: None,
                results: match finish_reason {
                    Some(reason) => smallvec![ResultDelta {
                        finish_reason: Some(reason),
                        ..Default::default()
                    }],
                    None => smallvec![],
                },
                usage: usage.map(|u| anthropic_usage_delta(u.input_tokens, u.output_tokens)),
            })
        }
        AnthropicStreamEvent::MessageStop {} => StreamChunk::Done,
        AnthropicStreamEvent::ContentBlockStop { .. } | AnthropicStreamEvent::Ping {} => {
            StreamChunk::Ignored
        }
        AnthropicStreamEvent::Error { error } => {
            return Err(CanonicalError::Upstream {
                error_type: error.type_.clone(),
                message: error.message.clone(),
            });
        }
    })
}
