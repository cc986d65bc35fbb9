use gloo_net::http::Request;
use gloo_timers::callback::Timeout;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;
use wasm_bindgen::{closure::Closure, JsCast};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{window, Document, Element, EventTarget, HtmlElement, HtmlImageElement, HtmlVideoElement};
use yew::prelude::*;

use crate::api::{clean_screenshots, screenshots_path, FetchError};
use crate::card::{Card, CardError, PopupDetails};
use crate::carousel::{HeroCarousel, MediaCarousel, MediaView, SlideKind, SlideView};
use crate::placement::{Rect, Viewport};
use crate::preview::{HoverPreviewController, HoverTimings, PopupView, ScreenshotSource, Ticket};
use crate::schedule::{Scheduler, TimerId};

const POPUP_MOUNT_ID: &str = "hover-preview-root";
const CARD_SELECTOR: &str = ".game-card";
const HERO_ROOT_ID: &str = "hero-carousel";
const MEDIA_ROOT_ID: &str = "media-carousel";

type PreviewController = HoverPreviewController<DomPopupView, WebScheduler, BackendScreenshots>;
type HeroController = HeroCarousel<HeroDom, WebScheduler>;
type MediaController = MediaCarousel<MediaDom, WebScheduler>;

fn viewport_size() -> (f64, f64) {
    let Some(win) = window() else {
        return (1280.0, 720.0);
    };

    let width = win
        .inner_width()
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or(1280.0);
    let height = win
        .inner_height()
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or(720.0);

    (width, height)
}

/// Weak reference to a controller, bound after the controller is built and
/// shared by the adapters that post completions back into it.
struct Handle<T>(Rc<RefCell<Weak<RefCell<T>>>>);

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: 'static> Handle<T> {
    fn new() -> Self {
        Self(Rc::new(RefCell::new(Weak::new())))
    }

    fn bind(&self, target: &Rc<RefCell<T>>) {
        *self.0.borrow_mut() = Rc::downgrade(target);
    }

    fn with(&self, apply: impl FnOnce(&mut T)) {
        let target = self.0.borrow().upgrade();
        if let Some(target) = target {
            apply(&mut target.borrow_mut());
        }
    }

    fn scheduler(&self, fire: fn(&mut T, TimerId)) -> WebScheduler {
        let handle = self.clone();
        WebScheduler::new(move |id| handle.with(|target| fire(target, id)))
    }
}

struct WebScheduler {
    next_id: u64,
    armed: HashMap<TimerId, Timeout>,
    on_fire: Rc<dyn Fn(TimerId)>,
}

impl WebScheduler {
    fn new(on_fire: impl Fn(TimerId) + 'static) -> Self {
        Self {
            next_id: 0,
            armed: HashMap::new(),
            on_fire: Rc::new(on_fire),
        }
    }
}

impl Scheduler for WebScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId::new(self.next_id);
        let on_fire = self.on_fire.clone();
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);

        self.armed
            .insert(id, Timeout::new(millis, move || on_fire(id)));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        // dropping a Timeout clears it
        self.armed.remove(&id);
    }
}

fn listen(target: &EventTarget, event: &str, handler: impl FnMut() + 'static) {
    let closure = Closure::<dyn FnMut()>::new(handler);

    if target
        .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        .is_ok()
    {
        closure.forget();
    }
}

fn query_all(root: &Element, selector: &str) -> Vec<Element> {
    let Ok(nodes) = root.query_selector_all(selector) else {
        return Vec::new();
    };

    (0..nodes.length())
        .filter_map(|index| nodes.get(index))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn query_html(root: &Element, selector: &str) -> Option<HtmlElement> {
    root.query_selector(selector)
        .ok()
        .flatten()
        .and_then(|element| element.dyn_into::<HtmlElement>().ok())
}

fn activate_only(elements: &[Element], index: usize) {
    for (position, element) in elements.iter().enumerate() {
        let classes = element.class_list();
        let _ = if position == index {
            classes.add_1("active")
        } else {
            classes.remove_1("active")
        };
    }
}

fn build_dots(document: &Document, container: Option<Element>, count: usize, class: &str) -> Vec<Element> {
    let Some(container) = container else {
        return Vec::new();
    };
    container.set_inner_html("");

    (0..count)
        .filter_map(|_| {
            let dot = document.create_element("div").ok()?;
            dot.set_class_name(class);
            container.append_child(&dot).ok()?;
            Some(dot)
        })
        .collect()
}

fn dataset(element: &Element, key: &str) -> Option<String> {
    element.dyn_ref::<HtmlElement>()?.dataset().get(key)
}

fn read_card(element: &Element) -> Result<Card, CardError> {
    Card::from_attributes(|key| dataset(element, key))
}

fn display_style(visible: bool) -> &'static str {
    if visible {
        "display: block;"
    } else {
        "display: none;"
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MediaSlot {
    Hidden,
    Video,
    Image,
}

#[derive(Clone, PartialEq)]
struct PopupState {
    active: bool,
    left: f64,
    top: f64,
    details: PopupDetails,
    media: MediaSlot,
    image_src: AttrValue,
    image_opacity: f64,
}

impl PopupState {
    fn hidden() -> Self {
        Self {
            active: false,
            left: 0.0,
            top: 0.0,
            details: PopupDetails::default(),
            media: MediaSlot::Hidden,
            image_src: AttrValue::default(),
            image_opacity: 1.0,
        }
    }
}

enum PopupAction {
    Details(PopupDetails),
    ResetMedia,
    Position { left: f64, top: f64 },
    Activate,
    Deactivate,
    ShowVideo,
    ShowImage(AttrValue),
    Opacity(f64),
}

impl Reducible for PopupState {
    type Action = PopupAction;

    fn reduce(self: Rc<Self>, action: PopupAction) -> Rc<Self> {
        let mut next = (*self).clone();

        match action {
            PopupAction::Details(details) => next.details = details,
            PopupAction::ResetMedia => next.media = MediaSlot::Hidden,
            PopupAction::Position { left, top } => {
                next.left = left;
                next.top = top;
            }
            PopupAction::Activate => next.active = true,
            PopupAction::Deactivate => next.active = false,
            PopupAction::ShowVideo => next.media = MediaSlot::Video,
            PopupAction::ShowImage(src) => {
                next.media = MediaSlot::Image;
                next.image_src = src;
            }
            PopupAction::Opacity(opacity) => next.image_opacity = opacity,
        }

        next.into()
    }
}

struct DomPopupView {
    popup: UseReducerHandle<PopupState>,
    video: NodeRef,
    controller: Handle<PreviewController>,
}

impl DomPopupView {
    fn stop_video(&self) {
        if let Some(video) = self.video.cast::<HtmlVideoElement>() {
            let _ = video.pause();
            video.set_current_time(0.0);
        }
    }
}

impl PopupView for DomPopupView {
    type Anchor = Element;

    fn measure(&self, anchor: &Element) -> (Rect, Viewport) {
        let rect = anchor.get_bounding_client_rect();
        let (width, height) = viewport_size();

        (
            Rect {
                left: rect.left(),
                top: rect.top(),
                right: rect.right(),
                bottom: rect.bottom(),
            },
            Viewport { width, height },
        )
    }

    fn set_details(&mut self, details: &PopupDetails) {
        self.popup.dispatch(PopupAction::Details(details.clone()));
    }

    fn reset_media(&mut self) {
        self.stop_video();
        self.popup.dispatch(PopupAction::ResetMedia);
    }

    fn position(&mut self, left: f64, top: f64) {
        self.popup.dispatch(PopupAction::Position { left, top });
    }

    fn activate(&mut self) {
        self.popup.dispatch(PopupAction::Activate);
    }

    fn hide(&mut self) {
        self.popup.dispatch(PopupAction::Deactivate);
        self.stop_video();
    }

    fn show_trailer(&mut self, url: &str, ticket: Ticket) {
        self.popup.dispatch(PopupAction::ShowVideo);
        let controller = self.controller.clone();

        let Some(video) = self.video.cast::<HtmlVideoElement>() else {
            spawn_local(async move {
                controller.with(|preview| preview.autoplay_rejected(ticket));
            });
            return;
        };

        video.set_muted(true);
        video.set_src("");
        video.set_src(url);
        video.load();
        let played = video.play();

        spawn_local(async move {
            let outcome = match played {
                Ok(promise) => JsFuture::from(promise).await.map(|_| ()),
                Err(error) => Err(error),
            };

            if let Err(error) = outcome {
                log::debug!("trailer autoplay rejected: {error:?}");
                controller.with(|preview| preview.autoplay_rejected(ticket));
            }
        });
    }

    fn show_image(&mut self, url: &str) {
        self.popup
            .dispatch(PopupAction::ShowImage(AttrValue::from(url.to_string())));
    }

    fn set_image_opacity(&mut self, opacity: f64) {
        self.popup.dispatch(PopupAction::Opacity(opacity));
    }

    fn preload_image(&mut self, url: &str, ticket: Ticket) {
        let controller = self.controller.clone();

        let Ok(image) = HtmlImageElement::new() else {
            spawn_local(async move {
                controller.with(|preview| preview.image_failed(ticket));
            });
            return;
        };

        image.set_src(url);
        let decoded = image.decode();

        spawn_local(async move {
            let loaded = JsFuture::from(decoded).await.is_ok();
            controller.with(|preview| {
                if loaded {
                    preview.image_loaded(ticket);
                } else {
                    preview.image_failed(ticket);
                }
            });
        });
    }
}

struct BackendScreenshots {
    controller: Handle<PreviewController>,
}

async fn fetch_screenshots(path: &str) -> Result<Vec<String>, FetchError> {
    let response = Request::get(path)
        .send()
        .await
        .map_err(|error| FetchError::Network(error.to_string()))?;

    if !response.ok() {
        return Err(FetchError::Status(response.status()));
    }

    let raw = response
        .json::<Vec<Option<String>>>()
        .await
        .map_err(|error| FetchError::Decode(error.to_string()))?;

    Ok(clean_screenshots(raw))
}

impl ScreenshotSource for BackendScreenshots {
    fn request(&mut self, card_id: &str, ticket: Ticket) {
        let controller = self.controller.clone();
        let path = screenshots_path(card_id);

        spawn_local(async move {
            let result = match path {
                Ok(path) => fetch_screenshots(&path).await,
                Err(error) => Err(error),
            };
            controller.with(|preview| preview.screenshots_loaded(ticket, result));
        });
    }
}

fn attach_hover_preview(popup: UseReducerHandle<PopupState>, video: NodeRef) -> Option<Rc<RefCell<PreviewController>>> {
    let root = window()?.document()?.document_element()?;
    let handle = Handle::new();

    let controller = Rc::new(RefCell::new(HoverPreviewController::new(
        DomPopupView {
            popup,
            video,
            controller: handle.clone(),
        },
        handle.scheduler(PreviewController::timer_fired),
        BackendScreenshots {
            controller: handle.clone(),
        },
        HoverTimings::default(),
    )));
    handle.bind(&controller);

    for card in query_all(&root, CARD_SELECTOR) {
        let on_enter = {
            let handle = handle.clone();
            let card = card.clone();
            move || match read_card(&card) {
                Ok(snapshot) => handle.with(|preview| preview.pointer_enter(snapshot, card.clone())),
                Err(error) => log::warn!("skipping hover preview: {error}"),
            }
        };
        let on_leave = {
            let handle = handle.clone();
            let card = card.clone();
            move || {
                if let Some(id) = dataset(&card, "id") {
                    handle.with(|preview| preview.pointer_leave(&id));
                }
            }
        };

        listen(&card, "mouseenter", on_enter);
        listen(&card, "mouseleave", on_leave);
    }

    Some(controller)
}

#[function_component(PopupHost)]
fn popup_host() -> Html {
    let popup = use_reducer(PopupState::hidden);
    let video = use_node_ref();

    {
        let popup = popup.clone();
        let video = video.clone();
        use_effect_with((), move |_| {
            let controller = attach_hover_preview(popup, video);
            move || drop(controller)
        });
    }

    let popup_style = format!("left: {:.2}px; top: {:.2}px;", popup.left, popup.top);
    let image_style = format!(
        "{} opacity: {};",
        display_style(popup.media == MediaSlot::Image),
        popup.image_opacity
    );

    html! {
        <div
            id="game-hover-popup"
            class={classes!(popup.active.then_some("active"))}
            style={popup_style}
            aria-hidden="true"
        >
            <div class="popup-media">
                <video
                    class="popup-video"
                    ref={video}
                    playsinline=""
                    style={display_style(popup.media == MediaSlot::Video)}
                />
                <img
                    class="popup-image"
                    src={popup.image_src.clone()}
                    alt={popup.details.title.clone()}
                    style={image_style}
                />
            </div>
            <div class="popup-content">
                <h3 class="popup-title">{popup.details.title.clone()}</h3>
                <div class="popup-meta">
                    <span class="popup-release">{popup.details.release.clone()}</span>
                    <span class="popup-rating">{popup.details.rating.clone()}</span>
                </div>
                <span class="popup-genre">{popup.details.genre.clone()}</span>
                <p class="popup-description">{popup.details.description.clone()}</p>
            </div>
        </div>
    }
}

struct HeroDom {
    slides: Vec<Element>,
    dots: Vec<Element>,
}

impl SlideView for HeroDom {
    fn show_slide(&mut self, index: usize) {
        activate_only(&self.slides, index);
        activate_only(&self.dots, index);
    }
}

fn start_hero_carousel(document: &Document) -> Option<Rc<RefCell<HeroController>>> {
    let root = document.document_element()?;
    let slides = query_all(&root, ".slide");
    let dots = build_dots(
        document,
        root.query_selector(".dot-navigation").ok().flatten(),
        slides.len(),
        "dot",
    );
    let next_button = root.query_selector(".next-btn").ok().flatten();
    let prev_button = root.query_selector(".prev-btn").ok().flatten();

    let handle = Handle::new();
    let len = slides.len();
    let carousel = Rc::new(RefCell::new(HeroCarousel::start(
        len,
        HeroDom {
            slides,
            dots: dots.clone(),
        },
        handle.scheduler(HeroController::timer_fired),
    )?));
    handle.bind(&carousel);

    for (index, dot) in dots.iter().enumerate() {
        let handle = handle.clone();
        listen(dot, "click", move || handle.with(|hero| hero.go_to(index)));
    }
    if let Some(button) = next_button {
        let handle = handle.clone();
        listen(&button, "click", move || handle.with(HeroController::next));
    }
    if let Some(button) = prev_button {
        let handle = handle.clone();
        listen(&button, "click", move || handle.with(HeroController::prev));
    }
    if let Some(banner) = document.get_element_by_id(HERO_ROOT_ID) {
        let enter = handle.clone();
        listen(&banner, "mouseenter", move || enter.with(HeroController::pointer_enter));
        let leave = handle.clone();
        listen(&banner, "mouseleave", move || leave.with(HeroController::pointer_leave));
    }

    Some(carousel)
}

struct MediaDom {
    slides: Vec<Element>,
    dots: Vec<Element>,
    videos: Vec<Option<HtmlVideoElement>>,
    prev: Option<HtmlElement>,
    next: Option<HtmlElement>,
}

fn set_visible(element: Option<&HtmlElement>, visible: bool) {
    if let Some(element) = element {
        let _ = element
            .style()
            .set_property("display", if visible { "block" } else { "none" });
    }
}

impl MediaView for MediaDom {
    fn show_slide(&mut self, index: usize) {
        activate_only(&self.slides, index);
        activate_only(&self.dots, index);
    }

    fn set_arrows(&mut self, prev_visible: bool, next_visible: bool) {
        set_visible(self.prev.as_ref(), prev_visible);
        set_visible(self.next.as_ref(), next_visible);
    }

    fn play_video(&mut self, index: usize) {
        if let Some(Some(video)) = self.videos.get(index) {
            video.set_current_time(0.0);
            if let Ok(promise) = video.play() {
                spawn_local(async move {
                    let _ = JsFuture::from(promise).await;
                });
            }
        }
    }

    fn pause_video(&mut self, index: usize) {
        if let Some(Some(video)) = self.videos.get(index) {
            let _ = video.pause();
        }
    }
}

fn start_media_carousel(document: &Document) -> Option<Rc<RefCell<MediaController>>> {
    let container = document.get_element_by_id(MEDIA_ROOT_ID)?;
    let slides = query_all(&container, ".media-slide");
    let videos: Vec<Option<HtmlVideoElement>> = slides
        .iter()
        .map(|slide| {
            slide
                .query_selector("video")
                .ok()
                .flatten()
                .and_then(|video| video.dyn_into::<HtmlVideoElement>().ok())
        })
        .collect();
    let kinds = videos
        .iter()
        .map(|video| match video {
            Some(_) => SlideKind::Video,
            None => SlideKind::Image,
        })
        .collect();
    let dots = build_dots(
        document,
        container.query_selector(".media-dots").ok().flatten(),
        slides.len(),
        "media-dot",
    );
    let prev_button = query_html(&container, ".prev-media");
    let next_button = query_html(&container, ".next-media");

    for video in videos.iter().flatten() {
        video.set_loop(false);
    }

    let handle = Handle::new();
    let carousel = Rc::new(RefCell::new(MediaCarousel::start(
        kinds,
        MediaDom {
            slides,
            dots: dots.clone(),
            videos: videos.clone(),
            prev: prev_button.clone(),
            next: next_button.clone(),
        },
        handle.scheduler(MediaController::timer_fired),
    )?));
    handle.bind(&carousel);

    for (index, video) in videos.iter().enumerate() {
        if let Some(video) = video {
            let handle = handle.clone();
            listen(video, "ended", move || handle.with(|strip| strip.video_ended(index)));
        }
    }
    for (index, dot) in dots.iter().enumerate() {
        let handle = handle.clone();
        listen(dot, "click", move || handle.with(|strip| strip.go_to(index)));
    }
    if let Some(button) = next_button {
        let handle = handle.clone();
        listen(&button, "click", move || handle.with(MediaController::next));
    }
    if let Some(button) = prev_button {
        let handle = handle.clone();
        listen(&button, "click", move || handle.with(MediaController::prev));
    }

    let enter = handle.clone();
    listen(&container, "mouseenter", move || enter.with(MediaController::pointer_enter));
    let leave = handle;
    listen(&container, "mouseleave", move || leave.with(MediaController::pointer_leave));

    Some(carousel)
}

pub fn run() {
    let _ = console_log::init_with_level(log::Level::Info);

    let Some(document) = window().and_then(|w| w.document()) else {
        return;
    };

    let hero = start_hero_carousel(&document);
    let media = start_media_carousel(&document);
    // page-lifetime widgets; their listeners only hold weak handles
    std::mem::forget((hero, media));

    match document.get_element_by_id(POPUP_MOUNT_ID) {
        Some(root) => {
            yew::Renderer::<PopupHost>::with_root(root).render();
        }
        None => log::debug!("no #{POPUP_MOUNT_ID} mount point, hover previews disabled"),
    }
}
