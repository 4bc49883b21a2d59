//! Hardware-accelerated sampling (feature `hardware`).
//!
//! [`AcceleratedBackend`] decodes the stream once, front to back, on a GPU
//! decoder and keeps every `round(interval × fps)`-th frame. Device frames are
//! copied into system memory only for the frames that are kept.
//!
//! Which device is used is controlled by [`HardwareAccelerationMode`],
//! passed through
//! [`ExtractOptions::with_hardware_acceleration`](crate::ExtractOptions::with_hardware_acceleration).
//! Availability depends on both the FFmpeg build and the host's drivers; when
//! no device can be opened the session falls back to software sampling.

use std::ptr;
use std::time::Duration;

use ffmpeg_next::{
    codec::context::Context as CodecContext, decoder::Video as VideoDecoder,
    frame::Video as VideoFrame,
};
use ffmpeg_sys_next::{
    AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX, AVBufferRef, AVCodecContext, AVHWDeviceType,
};

use crate::{
    backend::{CapturedFrame, FrameBackend, SamplingStrategy},
    config::PixelFormat,
    decode::StreamDecoder,
    error::FramepackError,
    metadata::SourceMetadata,
    readiness::{Deadline, WaitCondition},
    schedule::SampleSchedule,
    source::MediaSource,
};

/// Hardware device selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareAccelerationMode {
    /// Use the first device the codec supports.
    #[default]
    Auto,
    /// Never open a device; accelerated sampling falls back immediately.
    Software,
    /// Use this device type only.
    Specific(HardwareDeviceType),
}

/// Hardware device families FFmpeg can decode on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareDeviceType {
    /// NVIDIA CUDA.
    Cuda,
    /// VA-API (Linux).
    Vaapi,
    /// DXVA2 (Windows).
    Dxva2,
    /// Direct3D 11 (Windows).
    D3d11va,
    /// VideoToolbox (Apple).
    VideoToolbox,
    /// Intel Quick Sync.
    Qsv,
}

impl HardwareDeviceType {
    const ALL: [HardwareDeviceType; 6] = [
        HardwareDeviceType::Cuda,
        HardwareDeviceType::Vaapi,
        HardwareDeviceType::Dxva2,
        HardwareDeviceType::D3d11va,
        HardwareDeviceType::VideoToolbox,
        HardwareDeviceType::Qsv,
    ];

    fn to_av(self) -> AVHWDeviceType {
        match self {
            HardwareDeviceType::Cuda => AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
            HardwareDeviceType::Vaapi => AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI,
            HardwareDeviceType::Dxva2 => AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2,
            HardwareDeviceType::D3d11va => AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
            HardwareDeviceType::VideoToolbox => AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
            HardwareDeviceType::Qsv => AVHWDeviceType::AV_HWDEVICE_TYPE_QSV,
        }
    }

    fn from_av(device_type: AVHWDeviceType) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.to_av() == device_type)
    }
}

/// Device types compiled into the linked FFmpeg.
pub fn available_hardware_devices() -> Vec<HardwareDeviceType> {
    let mut devices = Vec::new();
    let mut device_type = AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;
    loop {
        device_type = unsafe { ffmpeg_sys_next::av_hwdevice_iterate_types(device_type) };
        if device_type == AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            return devices;
        }
        devices.extend(HardwareDeviceType::from_av(device_type));
    }
}

/// A decoder plus whether it is bound to a device.
pub(crate) struct HardwareDecoderSetup {
    pub(crate) decoder: VideoDecoder,
    pub(crate) hardware_active: bool,
}

/// Owned reference to an FFmpeg device context.
struct DeviceContext(*mut AVBufferRef);

impl DeviceContext {
    fn create(device_type: AVHWDeviceType) -> Result<Self, FramepackError> {
        let mut context: *mut AVBufferRef = ptr::null_mut();
        let ret = unsafe {
            ffmpeg_sys_next::av_hwdevice_ctx_create(
                &mut context,
                device_type,
                ptr::null(),
                ptr::null_mut(),
                0,
            )
        };
        if ret < 0 || context.is_null() {
            return Err(FramepackError::FfmpegError(format!(
                "cannot create {device_type:?} device (ret={ret})"
            )));
        }
        Ok(Self(context))
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe { ffmpeg_sys_next::av_buffer_unref(&mut self.0) };
    }
}

/// Device types the codec can decode on through a device context, in the
/// codec's order of preference.
fn supported_device_types(codec_context: &CodecContext) -> Vec<AVHWDeviceType> {
    // Contexts built from stream parameters carry no codec pointer yet.
    let Some(codec) = ffmpeg_next::decoder::find(codec_context.id()) else {
        return Vec::new();
    };
    let codec = unsafe { codec.as_ptr() };
    let mut supported = Vec::new();
    for index in 0.. {
        let config = unsafe { ffmpeg_sys_next::avcodec_get_hw_config(codec, index) };
        if config.is_null() {
            break;
        }
        let (methods, device_type) = unsafe { ((*config).methods, (*config).device_type) };
        if methods & (AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX as i32) != 0
            && device_type != AVHWDeviceType::AV_HWDEVICE_TYPE_NONE
        {
            supported.push(device_type);
        }
    }
    supported
}

/// Open a decoder for `codec_context`, bound to a device when `mode` allows
/// and one can be created. Falls back to a software decoder otherwise.
pub(crate) fn try_create_hardware_decoder(
    codec_context: CodecContext,
    mode: HardwareAccelerationMode,
) -> Result<HardwareDecoderSetup, FramepackError> {
    let supported = supported_device_types(&codec_context);
    let candidate = match mode {
        HardwareAccelerationMode::Software => None,
        HardwareAccelerationMode::Auto => supported.first().copied(),
        HardwareAccelerationMode::Specific(device) => {
            supported.contains(&device.to_av()).then(|| device.to_av())
        }
    };

    let device = candidate.and_then(|device_type| match DeviceContext::create(device_type) {
        Ok(device) => Some(device),
        Err(error) => {
            log::debug!("{error}");
            None
        }
    });

    let hardware_active = match &device {
        Some(device) => {
            // The codec context takes its own reference; ours is released on drop.
            unsafe {
                let context = codec_context.as_ptr() as *mut AVCodecContext;
                (*context).hw_device_ctx = ffmpeg_sys_next::av_buffer_ref(device.0);
            }
            true
        }
        None => false,
    };

    Ok(HardwareDecoderSetup {
        decoder: codec_context.decoder().video()?,
        hardware_active,
    })
}

/// Copy a device frame into system memory.
///
/// Returns `Ok(None)` when `frame` already lives in system memory.
pub(crate) fn transfer_hardware_frame(
    frame: &VideoFrame,
) -> Result<Option<VideoFrame>, FramepackError> {
    if unsafe { (*frame.as_ptr()).hw_frames_ctx.is_null() } {
        return Ok(None);
    }
    let mut software = VideoFrame::empty();
    let ret =
        unsafe { ffmpeg_sys_next::av_hwframe_transfer_data(software.as_mut_ptr(), frame.as_ptr(), 0) };
    if ret < 0 {
        return Err(FramepackError::VideoDecodeError(format!(
            "device frame transfer failed (ret={ret})"
        )));
    }
    software.set_pts(frame.pts());
    Ok(Some(software))
}

/// Decodes every frame once on a hardware device and keeps one frame per
/// stride.
pub struct AcceleratedBackend {
    stream: StreamDecoder,
    stride: u64,
    captured: u64,
}

impl AcceleratedBackend {
    pub(crate) fn new(source: MediaSource, decoder: VideoDecoder, pixel_format: PixelFormat) -> Self {
        Self {
            stream: StreamDecoder::with_decoder(source, decoder, pixel_format).with_hardware_frames(),
            stride: 1,
            captured: 0,
        }
    }
}

impl FrameBackend for AcceleratedBackend {
    fn metadata(&self) -> &SourceMetadata {
        self.stream.metadata()
    }

    fn strategy(&self) -> SamplingStrategy {
        SamplingStrategy::Accelerated
    }

    fn begin(&mut self, schedule: &SampleSchedule) -> Result<(), FramepackError> {
        self.stride = schedule.frame_stride(self.metadata().frames_per_second);
        self.captured = 0;
        log::debug!("Accelerated sampling keeps every {} frames", self.stride);
        self.stream.seek(Duration::ZERO)
    }

    fn capture(
        &mut self,
        target: Duration,
        deadline: &Deadline,
    ) -> Result<CapturedFrame, FramepackError> {
        let wanted = self.captured * self.stride;
        self.captured += 1;

        if self.stream.held_index() == Some(wanted) {
            return self.stream.capture_held();
        }
        if self.stream.is_exhausted() {
            return self.stream.capture_at_end(target);
        }
        while self
            .stream
            .advance(WaitCondition::FrameReady, target, deadline)?
        {
            if self.stream.held_index() == Some(wanted) {
                return self.stream.capture_held();
            }
        }
        self.stream.capture_at_end(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_types_round_trip() {
        for device in HardwareDeviceType::ALL {
            assert_eq!(HardwareDeviceType::from_av(device.to_av()), Some(device));
        }
        assert_eq!(HardwareDeviceType::from_av(AVHWDeviceType::AV_HWDEVICE_TYPE_NONE), None);
    }

    #[test]
    fn default_mode_is_auto() {
        assert_eq!(HardwareAccelerationMode::default(), HardwareAccelerationMode::Auto);
    }
}
