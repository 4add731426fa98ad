use std::thread;

use crossbeam_channel::Receiver;
use gpui::{
    App, AppContext, Bounds, KeyBinding, TitlebarOptions, WindowBounds, WindowOptions, actions,
    px, size,
};
use gpui_component::Root;

use crate::{pipeline::CameraStream, types::CountedFrame};

mod counter_view;
mod render_util;

use counter_view::CounterView;

actions!(finger_counter, [Quit]);

const WINDOW_SIZE: (f32, f32) = (1280.0, 720.0);

pub fn launch_ui(
    app: &mut App,
    result_rx: Receiver<CountedFrame>,
    camera_stream: CameraStream,
    recognizer_handle: thread::JoinHandle<()>,
) -> gpui::Result<()> {
    app.bind_keys([
        KeyBinding::new("q", Quit, None),
        KeyBinding::new("escape", Quit, None),
    ]);
    app.on_action(|_: &Quit, cx: &mut App| {
        log::info!("quit requested");
        cx.quit();
    });

    let bounds = Bounds::centered(None, size(px(WINDOW_SIZE.0), px(WINDOW_SIZE.1)), app);
    let window_options = WindowOptions {
        window_bounds: Some(WindowBounds::Windowed(bounds)),
        titlebar: Some(TitlebarOptions {
            title: Some("Finger Counter".into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|cx| {
            CounterView::new(result_rx, camera_stream, recognizer_handle, window, cx)
        });
        app.new(|cx| Root::new(view, window, cx))
    })?;
    app.activate(true);

    Ok(())
}
