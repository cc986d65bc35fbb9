pub const POPUP_WIDTH: f64 = 400.0;
pub const POPUP_HEIGHT: f64 = 500.0;
pub const POPUP_GUTTER: f64 = 15.0;
pub const POPUP_BOTTOM_CLEARANCE: f64 = 520.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Anchors the popup to the right of the card, flipping to the left when it
/// would overflow, and clamps it above the bottom edge.
pub fn place_popup(card: Rect, viewport: Viewport) -> (f64, f64) {
    let mut left = card.right + POPUP_GUTTER;
    let mut top = card.top;

    if left + POPUP_WIDTH > viewport.width {
        left = card.left - POPUP_WIDTH;
    }

    if top + POPUP_HEIGHT > viewport.height {
        top = viewport.height - POPUP_BOTTOM_CLEARANCE;
    }

    (left, top)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Viewport = Viewport {
        width: 1280.0,
        height: 800.0,
    };

    fn card_at(left: f64, top: f64) -> Rect {
        Rect {
            left,
            top,
            right: left + 200.0,
            bottom: top + 280.0,
        }
    }

    #[test]
    fn opens_to_the_right_when_there_is_room() {
        assert_eq!(place_popup(card_at(100.0, 120.0), VIEWPORT), (315.0, 120.0));
    }

    #[test]
    fn flips_left_near_right_edge() {
        // 866 + 15 + 400 = 1281 > 1280
        let card = card_at(666.0, 50.0);
        assert_eq!(place_popup(card, VIEWPORT), (266.0, 50.0));
    }

    #[test]
    fn exactly_fitting_popup_does_not_flip() {
        // 665 + 200 + 15 + 400 = 1280
        let card = card_at(665.0, 50.0);
        assert_eq!(place_popup(card, VIEWPORT).0, 880.0);
    }

    #[test]
    fn clamps_near_bottom_edge() {
        let (_, top) = place_popup(card_at(100.0, 301.0), VIEWPORT);
        assert_eq!(top, 280.0);

        let (_, top) = place_popup(card_at(100.0, 300.0), VIEWPORT);
        assert_eq!(top, 300.0);
    }
}
