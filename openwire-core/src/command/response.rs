//! Responses correlated back to requests by command id.

use super::ids::DataStructure;

/// Acknowledges a request that needs no result payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub command_id: i32,
    pub response_required: bool,
    /// The command id of the request being answered.
    pub correlation_id: i32,
}

impl Response {
    /// Creates a plain acknowledgment for the given request id.
    pub fn for_request(correlation_id: i32) -> Self {
        Self {
            correlation_id,
            ..Default::default()
        }
    }
}

/// One frame of a remote stack trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackTraceElement {
    pub class_name: String,
    pub method_name: String,
    pub file_name: String,
    pub line_number: i32,
}

/// A broker-side failure, including the remote exception chain.
///
/// Carried inside an [`ExceptionResponse`]; the stack trace only crosses the
/// wire when both peers negotiated `stack_trace_enabled`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerError {
    pub exception_class: String,
    pub message: String,
    pub stack_trace: Vec<StackTraceElement>,
    pub cause: Option<Box<BrokerError>>,
}

impl BrokerError {
    /// Creates a broker error with the given class and message.
    pub fn new(exception_class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_class: exception_class.into(),
            message: message.into(),
            stack_trace: Vec::new(),
            cause: None,
        }
    }
}

/// Reports that a request failed on the broker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionResponse {
    pub command_id: i32,
    pub response_required: bool,
    pub correlation_id: i32,
    pub exception: Option<BrokerError>,
}

/// Answers a request with a nested data structure.
#[derive(Debug, Clone, PartialEq)]
pub struct DataResponse {
    pub command_id: i32,
    pub response_required: bool,
    pub correlation_id: i32,
    pub data: Option<DataStructure>,
}

/// Answers a request with a single integer result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegerResponse {
    pub command_id: i32,
    pub response_required: bool,
    pub correlation_id: i32,
    pub result: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_for_request() {
        let response = Response::for_request(17);
        assert_eq!(response.correlation_id, 17);
        assert!(!response.response_required);
    }

    #[test]
    fn test_broker_error_chain() {
        let cause = BrokerError::new("java.io.IOException", "disk full");
        let mut outer = BrokerError::new("javax.jms.JMSException", "send failed");
        outer.cause = Some(Box::new(cause));

        assert_eq!(outer.cause.as_ref().unwrap().message, "disk full");
    }
}
