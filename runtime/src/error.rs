//! Runtime errors and their API status codes.

use thiserror::Error;

/// OpenCL status codes.
pub mod cl {
    pub const SUCCESS: i32 = 0;
    pub const MEM_OBJECT_ALLOCATION_FAILURE: i32 = -4;
    pub const OUT_OF_RESOURCES: i32 = -5;
    pub const OUT_OF_HOST_MEMORY: i32 = -6;
    pub const IMAGE_FORMAT_NOT_SUPPORTED: i32 = -10;
    pub const INVALID_VALUE: i32 = -30;
    pub const INVALID_HOST_PTR: i32 = -37;
    pub const INVALID_MEM_OBJECT: i32 = -38;
    pub const INVALID_IMAGE_FORMAT_DESCRIPTOR: i32 = -39;
    pub const INVALID_IMAGE_SIZE: i32 = -40;
    pub const INVALID_OPERATION: i32 = -59;
    pub const INVALID_BUFFER_SIZE: i32 = -61;
    pub const INVALID_IMAGE_DESCRIPTOR: i32 = -65;
}

/// Level Zero result codes.
pub mod ze {
    pub const RESULT_SUCCESS: u32 = 0;
    pub const RESULT_NOT_READY: u32 = 1;
    pub const RESULT_ERROR_OUT_OF_HOST_MEMORY: u32 = 0x7000_0002;
    pub const RESULT_ERROR_OUT_OF_DEVICE_MEMORY: u32 = 0x7000_0003;
    pub const RESULT_ERROR_UNINITIALIZED: u32 = 0x7800_0001;
    pub const RESULT_ERROR_INVALID_ARGUMENT: u32 = 0x7800_0004;
}

/// Errors from memory object creation, validation and transfers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageError {
    #[error("memory object allocation failure")]
    MemObjectAllocationFailure,
    #[error("out of resources")]
    OutOfResources,
    #[error("out of host memory")]
    OutOfHostMemory,
    #[error("image format not supported")]
    FormatNotSupported,
    #[error("invalid value")]
    InvalidValue,
    #[error("invalid host pointer")]
    InvalidHostPtr,
    #[error("invalid memory object")]
    InvalidMemObject,
    #[error("invalid image format descriptor")]
    InvalidImageFormatDescriptor,
    #[error("invalid image size")]
    InvalidImageSize,
    #[error("invalid operation")]
    InvalidOperation,
    #[error("invalid buffer size")]
    InvalidBufferSize,
    #[error("invalid image descriptor")]
    InvalidImageDescriptor,
}

impl ImageError {
    /// The OpenCL status code.
    pub fn code(&self) -> i32 {
        match self {
            Self::MemObjectAllocationFailure => cl::MEM_OBJECT_ALLOCATION_FAILURE,
            Self::OutOfResources => cl::OUT_OF_RESOURCES,
            Self::OutOfHostMemory => cl::OUT_OF_HOST_MEMORY,
            Self::FormatNotSupported => cl::IMAGE_FORMAT_NOT_SUPPORTED,
            Self::InvalidValue => cl::INVALID_VALUE,
            Self::InvalidHostPtr => cl::INVALID_HOST_PTR,
            Self::InvalidMemObject => cl::INVALID_MEM_OBJECT,
            Self::InvalidImageFormatDescriptor => cl::INVALID_IMAGE_FORMAT_DESCRIPTOR,
            Self::InvalidImageSize => cl::INVALID_IMAGE_SIZE,
            Self::InvalidOperation => cl::INVALID_OPERATION,
            Self::InvalidBufferSize => cl::INVALID_BUFFER_SIZE,
            Self::InvalidImageDescriptor => cl::INVALID_IMAGE_DESCRIPTOR,
        }
    }
}

/// OpenCL status of a result.
pub fn cl_status<T>(result: &Result<T, ImageError>) -> i32 {
    result.as_ref().map_or_else(ImageError::code, |_| cl::SUCCESS)
}

/// Errors from command queue creation and synchronization.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueError {
    /// Submitted work did not complete within the wait window. Retryable.
    #[error("command queue not ready")]
    NotReady,
    #[error("out of host memory")]
    OutOfHostMemory,
    #[error("out of device memory")]
    OutOfDeviceMemory,
    /// No command queue constructor is registered for the product family.
    #[error("command queue support uninitialized for this device")]
    Uninitialized,
    #[error("invalid argument")]
    InvalidArgument,
}

impl QueueError {
    /// The Level Zero result code.
    pub fn code(&self) -> u32 {
        match self {
            Self::NotReady => ze::RESULT_NOT_READY,
            Self::OutOfHostMemory => ze::RESULT_ERROR_OUT_OF_HOST_MEMORY,
            Self::OutOfDeviceMemory => ze::RESULT_ERROR_OUT_OF_DEVICE_MEMORY,
            Self::Uninitialized => ze::RESULT_ERROR_UNINITIALIZED,
            Self::InvalidArgument => ze::RESULT_ERROR_INVALID_ARGUMENT,
        }
    }
}

/// Level Zero result of a result.
pub fn ze_result<T>(result: &Result<T, QueueError>) -> u32 {
    result.as_ref().map_or_else(QueueError::code, |_| ze::RESULT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cl_codes() {
        assert_eq!(ImageError::InvalidImageSize.code(), -40);
        assert_eq!(ImageError::FormatNotSupported.code(), -10);
        assert_eq!(ImageError::InvalidImageDescriptor.code(), -65);
        assert_eq!(cl_status(&Ok::<(), ImageError>(())), cl::SUCCESS);
        assert_eq!(cl_status::<()>(&Err(ImageError::InvalidHostPtr)), -37);
    }

    #[test]
    fn test_ze_codes() {
        assert_eq!(QueueError::NotReady.code(), 1);
        assert_eq!(QueueError::OutOfDeviceMemory.code(), 0x7000_0003);
        assert_eq!(QueueError::Uninitialized.code(), 0x7800_0001);
        assert_eq!(ze_result(&Ok::<(), QueueError>(())), ze::RESULT_SUCCESS);
    }
}
