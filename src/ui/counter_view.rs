use std::{sync::Arc, thread};

use crossbeam_channel::Receiver;
use gpui::{
    AnyElement, Context, FocusHandle, InteractiveElement, IntoElement, ObjectFit, ParentElement,
    Render, RenderImage, Styled, StyledImage, Window, div, img, px,
};
use gpui_component::v_flex;

use super::render_util::frame_to_image;
use crate::{pipeline::CameraStream, types::CountedFrame};

const FPS_COLOR: u32 = 0x00ff00;
const HAND_COLOR: u32 = 0xff00ff;
const TOTAL_COLOR: u32 = 0xffff00;

#[derive(Clone, Debug, PartialEq, Eq)]
struct OverlayLine {
    text: String,
    color: u32,
}

/// Text drawn over the video, top to bottom.
fn overlay_lines(counted: &CountedFrame) -> Vec<OverlayLine> {
    let mut lines = Vec::with_capacity(counted.hands.len() + 2);
    lines.push(OverlayLine {
        text: counted.fps_text(),
        color: FPS_COLOR,
    });
    lines.extend(counted.hands.iter().map(|hand| OverlayLine {
        text: hand.display_text(),
        color: HAND_COLOR,
    }));
    lines.push(OverlayLine {
        text: counted.total_text(),
        color: TOTAL_COLOR,
    });
    lines
}

fn placeholder_message(stopped: bool) -> &'static str {
    if stopped {
        "Hand tracking stopped, see the log for details"
    } else {
        "Waiting for camera and hand models..."
    }
}

pub(super) struct CounterView {
    result_rx: Receiver<CountedFrame>,
    latest_image: Option<Arc<RenderImage>>,
    overlay: Vec<OverlayLine>,
    focus_handle: FocusHandle,
    recognizer_handle: thread::JoinHandle<()>,
    _camera_stream: CameraStream,
}

impl CounterView {
    pub(super) fn new(
        result_rx: Receiver<CountedFrame>,
        camera_stream: CameraStream,
        recognizer_handle: thread::JoinHandle<()>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> Self {
        let focus_handle = cx.focus_handle();
        window.focus(&focus_handle);

        Self {
            result_rx,
            latest_image: None,
            overlay: Vec::new(),
            focus_handle,
            recognizer_handle,
            _camera_stream: camera_stream,
        }
    }

    fn poll_results(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        let Some(counted) = self.result_rx.try_iter().last() else {
            return;
        };

        self.overlay = overlay_lines(&counted);
        if let Some(image) = frame_to_image(&counted.frame) {
            self.replace_latest_image(image, window, cx);
        }
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // Explicitly drop the previous GPU texture; otherwise the sprite atlas keeps
            // every frame and memory will climb rapidly while the camera is running.
            cx.drop_image(old_image, Some(window));
        }
    }

    /// Releases the last frame once the pipeline has stopped so the window
    /// does not keep showing a stale image.
    fn clear_stopped_output(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        self.overlay.clear();
        if let Some(old_image) = self.latest_image.take() {
            log::warn!("hand tracking stopped, clearing the last frame");
            cx.drop_image(old_image, Some(window));
        }
    }

    fn render_placeholder(&self, stopped: bool) -> AnyElement {
        div()
            .size_full()
            .flex()
            .items_center()
            .justify_center()
            .text_sm()
            .text_color(gpui::rgb(0x8b95a5))
            .child(placeholder_message(stopped))
            .into_any_element()
    }

    fn render_overlay(&self) -> AnyElement {
        let mut column = v_flex()
            .absolute()
            .top(px(12.0))
            .left(px(12.0))
            .gap_2()
            .p_2()
            .rounded_md()
            .bg(gpui::rgba(0x00000080));

        for line in &self.overlay {
            column = column.child(
                div()
                    .text_xl()
                    .font_weight(gpui::FontWeight::BOLD)
                    .text_color(gpui::rgb(line.color))
                    .child(line.text.clone()),
            );
        }

        column.into_any_element()
    }
}

impl Render for CounterView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) -> impl IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.poll_results(window, cx);

        let stopped = self.recognizer_handle.is_finished();
        if stopped {
            self.clear_stopped_output(window, cx);
        }

        let frame_view: AnyElement = match &self.latest_image {
            Some(image) => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => self.render_placeholder(stopped),
        };

        let mut root = div()
            .track_focus(&self.focus_handle)
            .relative()
            .size_full()
            .bg(gpui::rgb(0x000000))
            .child(frame_view);

        if !self.overlay.is_empty() {
            root = root.child(self.render_overlay());
        }

        root
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::types::{FingerCount, FingerState, Frame, HandCount, Handedness};

    #[test]
    fn overlay_lists_fps_hands_then_total() {
        use FingerState::{Curled, Extended};

        let counted = CountedFrame {
            frame: Frame {
                rgba: Vec::new(),
                width: 0,
                height: 0,
                timestamp: Instant::now(),
            },
            hands: vec![HandCount {
                handedness: Handedness::Right,
                confidence: 0.9,
                landmarks: Vec::new(),
                fingers: FingerCount::from_states([Curled, Extended, Extended, Curled, Curled]),
            }],
            fps: 14.2,
        };

        let texts: Vec<(String, u32)> = overlay_lines(&counted)
            .into_iter()
            .map(|line| (line.text, line.color))
            .collect();
        assert_eq!(
            texts,
            vec![
                ("FPS: 14".to_string(), FPS_COLOR),
                ("Right Hand: 2".to_string(), HAND_COLOR),
                ("Total Fingers: 2".to_string(), TOTAL_COLOR),
            ]
        );
    }

    #[test]
    fn stopped_pipeline_shows_stopped_message() {
        assert_eq!(
            placeholder_message(true),
            "Hand tracking stopped, see the log for details"
        );
        assert_eq!(
            placeholder_message(false),
            "Waiting for camera and hand models..."
        );
    }
}
