mod frame_timeline;

pub use self::frame_timeline::FrameTimeline;
