pub mod codec_image_decoder;
