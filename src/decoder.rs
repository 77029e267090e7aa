// Tag decoding collaborator
//
// Container readers find tag regions and hand their bytes to a `TagDecoder`.
// `StandardTagDecoder` covers ID3v1, ID3v2, Vorbis comments, FLAC pictures
// and MP4 item lists; callers can plug in their own.

use std::io::Read;

use crate::config::ReadOptions;
use crate::error::Result;
use crate::flac::picture::FlacPicture;
use crate::flac::vorbis::VorbisComment;
use crate::id3::frames::frames_to_fields;
use crate::id3::v1::Id3v1Tag;
use crate::id3::v2::{split_frames, Id3v2Header};
use crate::metadata::{Picture, TagFields};
use crate::mp4::items::decode_items;
use crate::utils::io::read_bytes_capped;

/// Decodes the tag regions located by the container readers.
///
/// Every reader passed in is bounded to the region; reading past its end
/// yields EOF.
pub trait TagDecoder {
    /// ID3v2 tag body, everything after the 10-byte header
    fn decode_id3v2(&self, header: &Id3v2Header, body: &mut dyn Read) -> Result<TagFields>;

    /// 128-byte ID3v1 block
    fn decode_id3v1(&self, block: &[u8]) -> Result<TagFields>;

    /// Vorbis comment packet, without any `\x03vorbis`/`OpusTags` prefix
    fn decode_vorbis_comment(&self, body: &mut dyn Read) -> Result<TagFields>;

    /// FLAC picture block payload
    fn decode_picture(&self, body: &mut dyn Read) -> Result<Picture>;

    /// Children of an MP4 `ilst` atom
    fn decode_mp4_items(&self, body: &mut dyn Read) -> Result<TagFields>;
}

/// The bundled decoder
#[derive(Debug, Clone, Default)]
pub struct StandardTagDecoder {
    options: ReadOptions,
}

impl StandardTagDecoder {
    pub fn with_options(options: ReadOptions) -> Self {
        StandardTagDecoder { options }
    }
}

impl TagDecoder for StandardTagDecoder {
    fn decode_id3v2(&self, header: &Id3v2Header, body: &mut dyn Read) -> Result<TagFields> {
        let data = read_bytes_capped(body, header.size as usize, self.options.max_upfront_read)?;
        let frames = split_frames(header, &data)?;
        Ok(frames_to_fields(&frames))
    }

    fn decode_id3v1(&self, block: &[u8]) -> Result<TagFields> {
        Ok(Id3v1Tag::parse(block)?.into_fields())
    }

    fn decode_vorbis_comment(&self, body: &mut dyn Read) -> Result<TagFields> {
        let comment = VorbisComment::read(body, self.options.max_upfront_read)?;
        Ok(comment.into_fields())
    }

    fn decode_picture(&self, body: &mut dyn Read) -> Result<Picture> {
        Ok(FlacPicture::read(body, self.options.max_upfront_read)?.into_picture())
    }

    fn decode_mp4_items(&self, body: &mut dyn Read) -> Result<TagFields> {
        decode_items(body)
    }
}
