//! Hover preview for game cards.
//!
//! A pointer that rests on a card for the hover-intent delay opens the shared
//! popup. Cards with a trailer play it; cards without one (or whose autoplay
//! gets blocked) show their art and then rotate through the backend's
//! screenshots. Every continuation carries the [`Ticket`] it was issued with
//! and is dropped once the session that issued it has ended.

use std::time::Duration;

use crate::api::FetchError;
use crate::card::{Card, PopupDetails};
use crate::placement::{place_popup, Rect, Viewport};
use crate::schedule::{Epoch, Scheduler, TimerId, TimerSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoverTimings {
    pub hover_intent: Duration,
    pub slide_interval: Duration,
    /// Longer than the popup's 400ms opacity transition so the swap never
    /// happens mid-fade.
    pub fade_gap: Duration,
    pub fade_in: Duration,
}

impl Default for HoverTimings {
    fn default() -> Self {
        Self {
            hover_intent: Duration::from_millis(500),
            slide_interval: Duration::from_millis(3_000),
            fade_gap: Duration::from_millis(500),
            fade_in: Duration::from_millis(400),
        }
    }
}

/// Identity of one asynchronous request made by a preview session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket {
    epoch: Epoch,
    serial: u64,
}

/// The popup surface. Hosts report the outcome of `show_trailer` (autoplay
/// rejection) and `preload_image` back to the controller with the same
/// ticket, always asynchronously.
pub trait PopupView {
    /// Whatever the host needs to measure the hovered card at open time.
    type Anchor;

    fn measure(&self, anchor: &Self::Anchor) -> (Rect, Viewport);
    fn set_details(&mut self, details: &PopupDetails);
    /// Hides both media elements and pauses and rewinds the video.
    fn reset_media(&mut self);
    fn position(&mut self, left: f64, top: f64);
    fn activate(&mut self);
    /// Deactivates the popup and pauses and rewinds the video.
    fn hide(&mut self);
    fn show_trailer(&mut self, url: &str, ticket: Ticket);
    /// Hides the video and shows the image element at `url`.
    fn show_image(&mut self, url: &str);
    fn set_image_opacity(&mut self, opacity: f64);
    /// Loads `url` off-screen.
    fn preload_image(&mut self, url: &str, ticket: Ticket);
}

pub trait ScreenshotSource {
    /// Starts fetching screenshot URLs for `card_id`; the host answers with
    /// [`HoverPreviewController::screenshots_loaded`].
    fn request(&mut self, card_id: &str, ticket: Ticket);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerPurpose {
    HoverIntent,
    SlideTick,
    FadeGap,
    FadeIn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlidePhase {
    Idle,
    FadingOut,
    Swapping,
    FadingIn,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreviewStatus {
    Idle,
    Pending {
        card_id: String,
    },
    Trailer {
        card_id: String,
    },
    Slideshow {
        card_id: String,
        rotation: Vec<String>,
        index: usize,
        phase: SlidePhase,
        rotating: bool,
    },
}

struct Slideshow {
    rotation: Vec<String>,
    index: usize,
    phase: SlidePhase,
    rotating: bool,
    fetch: Option<Ticket>,
    preload: Option<(Ticket, usize)>,
}

impl Slideshow {
    fn loading(default_image: &str, fetch: Ticket) -> Self {
        Self {
            rotation: vec![default_image.to_string()],
            index: 0,
            phase: SlidePhase::Idle,
            rotating: false,
            fetch: Some(fetch),
            preload: None,
        }
    }
}

enum Media {
    Trailer { ticket: Ticket },
    Slideshow(Slideshow),
}

struct Session {
    card: Card,
    display_image: String,
    media: Media,
}

enum State<A> {
    Idle,
    Pending { card: Card, anchor: A },
    Previewing(Session),
}

fn active_slideshow<A>(state: &mut State<A>) -> Option<(&str, &mut Slideshow)> {
    match state {
        State::Previewing(Session {
            card,
            media: Media::Slideshow(show),
            ..
        }) => Some((card.id.as_str(), show)),
        _ => None,
    }
}

fn next_ticket(serial: &mut u64, epoch: Epoch) -> Ticket {
    *serial = serial.wrapping_add(1);
    Ticket {
        epoch,
        serial: *serial,
    }
}

pub struct HoverPreviewController<V: PopupView, S: Scheduler, F: ScreenshotSource> {
    view: V,
    scheduler: S,
    screenshots: F,
    timings: HoverTimings,
    timers: TimerSet<TimerPurpose>,
    epoch: Epoch,
    serial: u64,
    state: State<V::Anchor>,
}

impl<V, S, F> HoverPreviewController<V, S, F>
where
    V: PopupView,
    S: Scheduler,
    F: ScreenshotSource,
{
    pub fn new(view: V, scheduler: S, screenshots: F, timings: HoverTimings) -> Self {
        Self {
            view,
            scheduler,
            screenshots,
            timings,
            timers: TimerSet::default(),
            epoch: Epoch::default(),
            serial: 0,
            state: State::Idle,
        }
    }

    pub fn status(&self) -> PreviewStatus {
        match &self.state {
            State::Idle => PreviewStatus::Idle,
            State::Pending { card, .. } => PreviewStatus::Pending {
                card_id: card.id.clone(),
            },
            State::Previewing(session) => match &session.media {
                Media::Trailer { .. } => PreviewStatus::Trailer {
                    card_id: session.card.id.clone(),
                },
                Media::Slideshow(show) => PreviewStatus::Slideshow {
                    card_id: session.card.id.clone(),
                    rotation: show.rotation.clone(),
                    index: show.index,
                    phase: show.phase,
                    rotating: show.rotating,
                },
            },
        }
    }

    /// Supersedes whatever the popup was doing and waits for hover intent.
    /// Nothing is rendered or fetched until the delay elapses.
    pub fn pointer_enter(&mut self, card: Card, anchor: V::Anchor) {
        self.end_session();
        self.timers
            .arm(&mut self.scheduler, self.timings.hover_intent, TimerPurpose::HoverIntent);
        self.state = State::Pending { card, anchor };
    }

    pub fn pointer_leave(&mut self, card_id: &str) {
        let owns_popup = match &self.state {
            State::Idle => false,
            State::Pending { card, .. } => card.id == card_id,
            State::Previewing(session) => session.card.id == card_id,
        };

        if !owns_popup {
            log::debug!("ignoring pointer leave for inactive card {card_id}");
            return;
        }

        self.end_session();
    }

    pub fn timer_fired(&mut self, id: TimerId) {
        let Some(purpose) = self.timers.fired(&mut self.scheduler, id) else {
            log::debug!("dropping stale timer {}", id.get());
            return;
        };

        match purpose {
            TimerPurpose::HoverIntent => self.open_preview(),
            TimerPurpose::SlideTick => self.slide_tick(),
            TimerPurpose::FadeGap => self.swap_slide(),
            TimerPurpose::FadeIn => self.settle_slide(),
        }
    }

    pub fn autoplay_rejected(&mut self, ticket: Ticket) {
        if !self.is_current(ticket) {
            return;
        }

        let State::Previewing(Session {
            card,
            media: Media::Trailer { ticket: expected },
            ..
        }) = &self.state
        else {
            return;
        };

        if *expected != ticket {
            return;
        }

        log::debug!("autoplay blocked for game {}, falling back to screenshots", card.id);

        let fetch = next_ticket(&mut self.serial, self.epoch);
        if let State::Previewing(session) = &mut self.state {
            session.media = Media::Slideshow(Slideshow::loading(&session.display_image, fetch));
        }
        self.start_slideshow(fetch);
    }

    pub fn screenshots_loaded(&mut self, ticket: Ticket, result: Result<Vec<String>, FetchError>) {
        if !self.is_current(ticket) {
            log::debug!("discarding screenshots for a finished preview");
            return;
        }

        let Some((card_id, show)) = active_slideshow(&mut self.state) else {
            return;
        };

        if show.fetch != Some(ticket) {
            return;
        }
        show.fetch = None;

        let screenshots = match result {
            Ok(screenshots) => screenshots,
            Err(error) => {
                log::warn!("screenshots for game {card_id} unavailable: {error}");
                return;
            }
        };

        if screenshots.is_empty() {
            log::debug!("no screenshots for game {card_id}, keeping cover art");
            return;
        }

        show.rotation.extend(screenshots);
        show.rotating = true;
        self.timers
            .arm(&mut self.scheduler, self.timings.slide_interval, TimerPurpose::SlideTick);
    }

    pub fn image_loaded(&mut self, ticket: Ticket) {
        let Some(next) = self.claim_preload(ticket) else {
            return;
        };
        let Some((_, show)) = active_slideshow(&mut self.state) else {
            return;
        };

        show.index = next;
        show.phase = SlidePhase::FadingIn;
        self.view.show_image(&show.rotation[next]);
        self.view.set_image_opacity(1.0);
        self.timers
            .arm(&mut self.scheduler, self.timings.fade_in, TimerPurpose::FadeIn);
    }

    /// Keeps the current image on screen; the next tick moves past the
    /// broken entry.
    pub fn image_failed(&mut self, ticket: Ticket) {
        let Some(next) = self.claim_preload(ticket) else {
            return;
        };
        let Some((card_id, show)) = active_slideshow(&mut self.state) else {
            return;
        };

        log::warn!("screenshot {} for game {card_id} failed to load", show.rotation[next]);
        show.index = next;
        show.phase = SlidePhase::Idle;
        self.view.set_image_opacity(1.0);
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.epoch == self.epoch
    }

    fn claim_preload(&mut self, ticket: Ticket) -> Option<usize> {
        if !self.is_current(ticket) {
            log::debug!("discarding preload for a finished preview");
            return None;
        }

        let (_, show) = active_slideshow(&mut self.state)?;
        match show.preload {
            Some((expected, next)) if expected == ticket => {
                show.preload = None;
                Some(next)
            }
            _ => None,
        }
    }

    fn end_session(&mut self) {
        self.timers.cancel_all(&mut self.scheduler);
        self.epoch.advance();

        let previous = std::mem::replace(&mut self.state, State::Idle);
        if matches!(previous, State::Previewing(_)) {
            self.view.hide();
        }
    }

    fn open_preview(&mut self) {
        let State::Pending { card, anchor } = std::mem::replace(&mut self.state, State::Idle) else {
            return;
        };

        self.view.set_details(&card.details());
        let display_image = card.display_image().to_string();
        self.view.reset_media();

        let (rect, viewport) = self.view.measure(&anchor);
        let (left, top) = place_popup(rect, viewport);
        self.view.position(left, top);
        self.view.activate();

        match card.trailer().map(ToString::to_string) {
            Some(trailer) => {
                let ticket = next_ticket(&mut self.serial, self.epoch);
                log::debug!("playing trailer for game {}", card.id);
                self.state = State::Previewing(Session {
                    card,
                    display_image,
                    media: Media::Trailer { ticket },
                });
                self.view.show_trailer(&trailer, ticket);
            }
            None => {
                let fetch = next_ticket(&mut self.serial, self.epoch);
                self.state = State::Previewing(Session {
                    media: Media::Slideshow(Slideshow::loading(&display_image, fetch)),
                    card,
                    display_image,
                });
                self.start_slideshow(fetch);
            }
        }
    }

    /// Shows the default image at full opacity and asks for screenshots.
    fn start_slideshow(&mut self, fetch: Ticket) {
        let State::Previewing(session) = &self.state else {
            return;
        };

        self.view.show_image(&session.display_image);
        self.view.set_image_opacity(1.0);
        self.screenshots.request(&session.card.id, fetch);
    }

    fn slide_tick(&mut self) {
        let Some((card_id, show)) = active_slideshow(&mut self.state) else {
            return;
        };

        self.timers
            .arm(&mut self.scheduler, self.timings.slide_interval, TimerPurpose::SlideTick);

        match show.phase {
            SlidePhase::Idle | SlidePhase::FadingIn => {
                self.timers
                    .cancel_purpose(&mut self.scheduler, TimerPurpose::FadeIn);
                show.phase = SlidePhase::FadingOut;
                self.view.set_image_opacity(0.0);
                self.timers
                    .arm(&mut self.scheduler, self.timings.fade_gap, TimerPurpose::FadeGap);
            }
            SlidePhase::FadingOut | SlidePhase::Swapping => {
                log::debug!("game {card_id} still swapping, skipping slide tick");
            }
        }
    }

    fn swap_slide(&mut self) {
        let Some((_, show)) = active_slideshow(&mut self.state) else {
            return;
        };

        if show.phase != SlidePhase::FadingOut {
            return;
        }

        let next = (show.index + 1) % show.rotation.len();
        let ticket = next_ticket(&mut self.serial, self.epoch);
        show.phase = SlidePhase::Swapping;
        show.preload = Some((ticket, next));
        self.view.preload_image(&show.rotation[next], ticket);
    }

    fn settle_slide(&mut self) {
        if let Some((_, show)) = active_slideshow(&mut self.state) {
            if show.phase == SlidePhase::FadingIn {
                show.phase = SlidePhase::Idle;
            }
        }
    }
}
