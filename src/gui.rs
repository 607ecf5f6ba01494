//! Image windows.
//!
//! The windowing event loop has to own the main thread. [`run`] starts it there and moves the
//! application onto a second thread, from which [`show_image`] and [`quit_requested`] may be
//! called.

mod renderer;

use std::{
    collections::HashMap,
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, PoisonError,
    },
    thread,
};

use once_cell::sync::OnceCell;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::{
    image::{Image, Resolution},
    termination::Termination,
};

use self::renderer::{Gpu, Renderer};

/// Typing this into any window asks the app to quit.
const QUIT_KEY: char = 'q';

static PROXY: OnceCell<Mutex<EventLoopProxy<Frame>>> = OnceCell::new();

static QUIT: AtomicBool = AtomicBool::new(false);

/// An image sent from the app thread to the event loop.
#[derive(Debug)]
struct Frame {
    title: String,
    res: Resolution,
    rgba: Vec<u8>,
}

/// One window per image title, all rendering on the same GPU.
struct Windows {
    gpu: Rc<Gpu>,
    by_title: HashMap<String, Renderer>,
    titles: HashMap<WindowId, String>,
}

impl Windows {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            gpu: Rc::new(pollster::block_on(Gpu::open())?),
            by_title: HashMap::new(),
            titles: HashMap::new(),
        })
    }

    fn show(
        &mut self,
        target: &EventLoopWindowTarget<Frame>,
        frame: Frame,
    ) -> anyhow::Result<()> {
        let Frame { title, res, rgba } = frame;
        if !self.by_title.contains_key(&title) {
            log::debug!("opening {res} window '{title}'");
            let renderer = Renderer::open(target, &title, res, self.gpu.clone())?;
            self.titles.insert(renderer.window().id(), title.clone());
            self.by_title.insert(title.clone(), renderer);
        }

        if let Some(renderer) = self.by_title.get_mut(&title) {
            renderer.update_texture(res, &rgba);
            renderer.window().request_redraw();
        }
        Ok(())
    }

    fn redraw(&mut self, id: WindowId) {
        let renderer = self
            .titles
            .get(&id)
            .and_then(|title| self.by_title.get_mut(title));
        if let Some(renderer) = renderer {
            renderer.redraw();
        }
    }

    fn run(mut self, event_loop: EventLoop<Frame>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(frame) => {
                    if let Err(e) = self.show(target, frame) {
                        log::error!("cannot show image: {e:#}");
                        process::exit(1);
                    }
                }
                Event::WindowEvent {
                    event: WindowEvent::ReceivedCharacter(QUIT_KEY) | WindowEvent::CloseRequested,
                    ..
                } => {
                    if !QUIT.swap(true, Ordering::Relaxed) {
                        log::debug!("quit requested");
                    }
                }
                Event::RedrawRequested(id) => self.redraw(id),
                _ => {}
            }
        })
    }
}

/// Runs the GUI on the calling thread, which must be the main thread, and `app` on a new one.
///
/// Never returns. The process exits as soon as `app` does: with status 0 if it succeeded, with
/// status 1 after reporting the error if it failed, and with status 101 if it panicked.
pub fn run<F, R>(app: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    if PROXY.set(Mutex::new(event_loop.create_proxy())).is_err() {
        log::error!("`gui::run` may only be called once");
        process::exit(1);
    }

    let windows = match Windows::new() {
        Ok(windows) => windows,
        Err(e) => {
            eprintln!("Error: {e:?}");
            process::exit(1);
        }
    };

    thread::spawn(move || {
        let status = match catch_unwind(AssertUnwindSafe(app)) {
            Ok(result) if result.is_success() => 0,
            Ok(result) => {
                result.report();
                1
            }
            // The panic hook already printed the message.
            Err(_) => 101,
        };
        process::exit(status);
    });

    windows.run(event_loop)
}

/// Shows `image` in the window titled `title`, opening the window on first use.
pub fn show_image(title: impl Into<String>, image: &Image) {
    let frame = Frame {
        title: title.into(),
        res: image.resolution(),
        rgba: image.data().to_vec(),
    };
    let Some(proxy) = PROXY.get() else {
        log::warn!("GUI is not running, dropping image '{}'", frame.title);
        return;
    };
    let sent = proxy
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .send_event(frame);
    if sent.is_err() {
        log::debug!("event loop has exited, dropping image");
    }
}

/// Whether `q` was typed into a window or a window was closed.
pub fn quit_requested() -> bool {
    QUIT.load(Ordering::Relaxed)
}
