pub mod ssd1306;
