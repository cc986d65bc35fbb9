//! Page carousels. The hero banner pauses on any hover; the game-detail media
//! strip only pauses while an image is showing and lets videos run to their end.

use std::time::Duration;

use crate::schedule::{Scheduler, TimerId, TimerSet};

pub const HERO_INTERVAL: Duration = Duration::from_millis(5_000);
pub const MEDIA_IMAGE_DWELL: Duration = Duration::from_millis(10_000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Autoplay;

pub trait SlideView {
    /// Marks slide `index` and its dot active, clearing the others.
    fn show_slide(&mut self, index: usize);
}

pub struct HeroCarousel<V: SlideView, S: Scheduler> {
    view: V,
    scheduler: S,
    timers: TimerSet<Autoplay>,
    len: usize,
    current: usize,
}

impl<V: SlideView, S: Scheduler> HeroCarousel<V, S> {
    /// Returns `None` for an empty banner.
    pub fn start(len: usize, view: V, scheduler: S) -> Option<Self> {
        if len == 0 {
            return None;
        }

        let mut carousel = Self {
            view,
            scheduler,
            timers: TimerSet::default(),
            len,
            current: 0,
        };
        carousel.view.show_slide(0);
        carousel.arm_autoplay();
        Some(carousel)
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn next(&mut self) {
        self.go_to((self.current + 1) % self.len);
    }

    pub fn prev(&mut self) {
        self.go_to((self.current + self.len - 1) % self.len);
    }

    pub fn go_to(&mut self, index: usize) {
        if index >= self.len {
            return;
        }

        self.current = index;
        self.view.show_slide(index);
    }

    pub fn pointer_enter(&mut self) {
        self.timers.cancel_all(&mut self.scheduler);
    }

    pub fn pointer_leave(&mut self) {
        self.arm_autoplay();
    }

    pub fn timer_fired(&mut self, id: TimerId) {
        if self.timers.fired(&mut self.scheduler, id).is_none() {
            return;
        }

        self.arm_autoplay();
        self.next();
    }

    fn arm_autoplay(&mut self) {
        self.timers.cancel_all(&mut self.scheduler);
        self.timers.arm(&mut self.scheduler, HERO_INTERVAL, Autoplay);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlideKind {
    Image,
    Video,
}

pub trait MediaView {
    fn show_slide(&mut self, index: usize);
    fn set_arrows(&mut self, prev_visible: bool, next_visible: bool);
    /// Rewinds and plays the video on slide `index`. A rejected play is ignored.
    fn play_video(&mut self, index: usize);
    fn pause_video(&mut self, index: usize);
}

pub struct MediaCarousel<V: MediaView, S: Scheduler> {
    view: V,
    scheduler: S,
    timers: TimerSet<Autoplay>,
    slides: Vec<SlideKind>,
    current: usize,
}

impl<V: MediaView, S: Scheduler> MediaCarousel<V, S> {
    pub fn start(slides: Vec<SlideKind>, view: V, scheduler: S) -> Option<Self> {
        if slides.is_empty() {
            return None;
        }

        let mut carousel = Self {
            view,
            scheduler,
            timers: TimerSet::default(),
            slides,
            current: 0,
        };
        carousel.go_to(0);
        Some(carousel)
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn next(&mut self) {
        self.go_to((self.current + 1) % self.slides.len());
    }

    pub fn prev(&mut self) {
        let len = self.slides.len();
        self.go_to((self.current + len - 1) % len);
    }

    pub fn go_to(&mut self, index: usize) {
        let Some(kind) = self.slides.get(index).copied() else {
            return;
        };

        if index != self.current && self.slides[self.current] == SlideKind::Video {
            self.view.pause_video(self.current);
        }
        if kind == SlideKind::Video {
            self.view.play_video(index);
        }

        self.view.show_slide(index);
        self.current = index;
        self.view
            .set_arrows(index != 0, index != self.slides.len() - 1);
        self.schedule_next();
    }

    /// Video slides advance on their own end event; only that of the slide
    /// currently showing counts.
    pub fn video_ended(&mut self, index: usize) {
        if index == self.current && self.slides[index] == SlideKind::Video {
            self.next();
        }
    }

    pub fn pointer_enter(&mut self) {
        if self.slides[self.current] == SlideKind::Image {
            self.timers.cancel_all(&mut self.scheduler);
        }
    }

    pub fn pointer_leave(&mut self) {
        if self.slides[self.current] == SlideKind::Image {
            self.schedule_next();
        }
    }

    pub fn timer_fired(&mut self, id: TimerId) {
        if self.timers.fired(&mut self.scheduler, id).is_some() {
            self.next();
        }
    }

    fn schedule_next(&mut self) {
        self.timers.cancel_all(&mut self.scheduler);
        if self.slides[self.current] == SlideKind::Image {
            self.timers
                .arm(&mut self.scheduler, MEDIA_IMAGE_DWELL, Autoplay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::manual::{advance, ManualScheduler};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Show(usize),
        Arrows(bool, bool),
        Play(usize),
        Pause(usize),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Rc<RefCell<Vec<Call>>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.borrow_mut())
        }
    }

    impl SlideView for Recorder {
        fn show_slide(&mut self, index: usize) {
            self.calls.borrow_mut().push(Call::Show(index));
        }
    }

    impl MediaView for Recorder {
        fn show_slide(&mut self, index: usize) {
            self.calls.borrow_mut().push(Call::Show(index));
        }

        fn set_arrows(&mut self, prev_visible: bool, next_visible: bool) {
            self.calls
                .borrow_mut()
                .push(Call::Arrows(prev_visible, next_visible));
        }

        fn play_video(&mut self, index: usize) {
            self.calls.borrow_mut().push(Call::Play(index));
        }

        fn pause_video(&mut self, index: usize) {
            self.calls.borrow_mut().push(Call::Pause(index));
        }
    }

    fn hero(len: usize) -> (HeroCarousel<Recorder, ManualScheduler>, ManualScheduler, Recorder) {
        let scheduler = ManualScheduler::default();
        let view = Recorder::default();
        let carousel = HeroCarousel::start(len, view.clone(), scheduler.clone())
            .expect("non-empty hero");
        view.take();
        (carousel, scheduler, view)
    }

    fn media(
        slides: Vec<SlideKind>,
    ) -> (MediaCarousel<Recorder, ManualScheduler>, ManualScheduler, Recorder) {
        let scheduler = ManualScheduler::default();
        let view = Recorder::default();
        let carousel = MediaCarousel::start(slides, view.clone(), scheduler.clone())
            .expect("non-empty media strip");
        (carousel, scheduler, view)
    }

    #[test]
    fn empty_carousels_do_not_start() {
        let hero = HeroCarousel::start(0, Recorder::default(), ManualScheduler::default());
        assert!(hero.is_none());

        let strip = MediaCarousel::start(Vec::new(), Recorder::default(), ManualScheduler::default());
        assert!(strip.is_none());
    }

    #[test]
    fn hero_autoplays_and_wraps() {
        let (mut carousel, scheduler, view) = hero(3);

        advance(&scheduler, Duration::from_millis(15_000), |id| carousel.timer_fired(id));

        assert_eq!(view.take(), vec![Call::Show(1), Call::Show(2), Call::Show(0)]);
        assert_eq!(carousel.current(), 0);
    }

    #[test]
    fn hero_prev_wraps_to_last() {
        let (mut carousel, _, view) = hero(4);
        carousel.prev();
        assert_eq!(carousel.current(), 3);
        carousel.go_to(9);
        assert_eq!(view.take(), vec![Call::Show(3)]);
    }

    #[test]
    fn hero_pauses_on_any_hover() {
        let (mut carousel, scheduler, view) = hero(3);

        carousel.pointer_enter();
        advance(&scheduler, Duration::from_millis(20_000), |id| carousel.timer_fired(id));
        assert!(view.take().is_empty());

        carousel.pointer_leave();
        advance(&scheduler, Duration::from_millis(4_999), |id| carousel.timer_fired(id));
        assert!(view.take().is_empty());
        advance(&scheduler, Duration::from_millis(1), |id| carousel.timer_fired(id));
        assert_eq!(view.take(), vec![Call::Show(1)]);
    }

    #[test]
    fn media_arrows_hide_at_the_ends() {
        let (mut carousel, _, view) = media(vec![SlideKind::Image, SlideKind::Image, SlideKind::Image]);
        assert_eq!(view.take(), vec![Call::Show(0), Call::Arrows(false, true)]);

        carousel.next();
        assert_eq!(view.take(), vec![Call::Show(1), Call::Arrows(true, true)]);

        carousel.go_to(2);
        assert_eq!(view.take(), vec![Call::Show(2), Call::Arrows(true, false)]);
    }

    #[test]
    fn media_images_dwell_then_advance() {
        let (mut carousel, scheduler, view) = media(vec![SlideKind::Image, SlideKind::Image]);
        view.take();

        advance(&scheduler, Duration::from_millis(9_999), |id| carousel.timer_fired(id));
        assert_eq!(carousel.current(), 0);
        advance(&scheduler, Duration::from_millis(1), |id| carousel.timer_fired(id));
        assert_eq!(carousel.current(), 1);
    }

    #[test]
    fn media_videos_advance_on_end_not_on_timer() {
        let (mut carousel, scheduler, view) = media(vec![SlideKind::Video, SlideKind::Image]);
        assert_eq!(
            view.take(),
            vec![Call::Play(0), Call::Show(0), Call::Arrows(false, true)]
        );

        advance(&scheduler, Duration::from_millis(60_000), |id| carousel.timer_fired(id));
        assert_eq!(carousel.current(), 0);

        carousel.video_ended(0);
        assert_eq!(carousel.current(), 1);
        assert_eq!(view.take()[0], Call::Pause(0));

        // a late end event from the old video is ignored
        carousel.video_ended(0);
        assert_eq!(carousel.current(), 1);
    }

    #[test]
    fn media_hover_pauses_images_only() {
        let (mut carousel, scheduler, _) = media(vec![SlideKind::Image, SlideKind::Video]);

        carousel.pointer_enter();
        advance(&scheduler, Duration::from_millis(30_000), |id| carousel.timer_fired(id));
        assert_eq!(carousel.current(), 0);

        carousel.pointer_leave();
        advance(&scheduler, Duration::from_millis(10_000), |id| carousel.timer_fired(id));
        assert_eq!(carousel.current(), 1);

        // on a video slide hover changes nothing
        carousel.pointer_enter();
        carousel.video_ended(1);
        assert_eq!(carousel.current(), 0);
    }
}
