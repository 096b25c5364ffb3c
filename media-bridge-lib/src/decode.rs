//! Whole-buffer SVG decode through a remote rasterizer

use log::debug;

use crate::error::{Error, Result};
use crate::remote::{DecodeBinding, RemoteImage};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    Intra,
}

/// One decoded picture, independent of every other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Bytes per row.
    pub linesize: usize,
    pub data: Vec<u8>,
    pub key_frame: bool,
    pub picture_type: PictureType,
    /// Logical document size, which may differ from the raster size.
    pub coded_width: u32,
    pub coded_height: u32,
}

impl Frame {
    fn rgba(width: u32, height: u32) -> Self {
        let format = PixelFormat::Rgba;
        let linesize = width as usize * format.bytes_per_pixel();
        Frame {
            width,
            height,
            format,
            linesize,
            data: vec![0; linesize * height as usize],
            key_frame: true,
            picture_type: PictureType::Intra,
            coded_width: width,
            coded_height: height,
        }
    }
}

/// Same bounds the host applies before allocating a picture.
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    let w = width as u64;
    let h = height as u64;
    if w == 0 || h == 0 || (w + 128) * (h + 128) >= (i32::MAX / 8) as u64 {
        return Err(Error::InvalidArgument(format!(
            "picture size {}x{} is invalid",
            width, height
        )));
    }
    Ok(())
}

pub struct SvgDecoder<B: DecodeBinding> {
    session: Session<B>,
}

impl<B: DecodeBinding> SvgDecoder<B> {
    pub fn new(binding: B) -> Self {
        SvgDecoder {
            session: Session::new(binding),
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.session.open(|binding| binding.construct())
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_open()
    }

    pub fn binding(&self) -> &B {
        self.session.binding()
    }

    /// Decodes one packet into a frame.
    ///
    /// `Error::Decode` leaves the decoder usable for the next packet.
    pub fn decode(&mut self, packet: &[u8]) -> Result<Frame> {
        let (binding, instance) = self
            .session
            .parts()
            .ok_or_else(|| Error::invalid_argument("decoder not initialized"))?;
        if packet.is_empty() {
            return Err(Error::Decode("empty packet".to_string()));
        }
        debug!("decoding {} byte packet", packet.len());

        let rasterized = binding.decode(instance, packet, |image: &mut dyn RemoteImage| {
            let (width, height) = image.dimensions()?;
            check_dimensions(width, height)?;
            let mut frame = Frame::rgba(width, height);
            image.copy_pixels(&mut frame.data)?;
            Ok(frame)
        })?;
        let mut frame =
            rasterized.ok_or_else(|| Error::Decode("remote decoder produced no image".to_string()))?;

        let (coded_width, coded_height) = binding.document_size(instance)?;
        if coded_width > 0 && coded_height > 0 {
            frame.coded_width = coded_width as u32;
            frame.coded_height = coded_height as u32;
        } else {
            debug!(
                "document size {}x{} unusable, keeping raster size",
                coded_width, coded_height
            );
        }

        debug!(
            "decoded {}x{} (coded {}x{})",
            frame.width, frame.height, frame.coded_width, frame.coded_height
        );
        Ok(frame)
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}
