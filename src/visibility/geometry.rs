//! Rectangles and CSS-style root margins.

use std::fmt;
use std::str::FromStr;

use crate::error::ObserverError;

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Overlap of two rectangles. Edge-adjacent rectangles intersect with a
    /// zero-area result, matching how browsers treat touching boxes.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right >= left && bottom >= top {
            Some(Rect::new(left, top, right - left, bottom - top))
        } else {
            None
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// One side of a root margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarginLength {
    Px(f64),
    Percent(f64),
}

impl MarginLength {
    /// Resolve against the root dimension along the same axis.
    pub fn resolve(&self, basis: f64) -> f64 {
        match *self {
            MarginLength::Px(px) => px,
            MarginLength::Percent(pct) => basis * pct / 100.0,
        }
    }
}

impl fmt::Display for MarginLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginLength::Px(v) => write!(f, "{}px", v),
            MarginLength::Percent(v) => write!(f, "{}%", v),
        }
    }
}

impl FromStr for MarginLength {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| v.trim().parse::<f64>().ok().filter(|n| n.is_finite());

        if let Some(px) = s.strip_suffix("px") {
            parse(px).map(MarginLength::Px).ok_or(())
        } else if let Some(pct) = s.strip_suffix('%') {
            parse(pct).map(MarginLength::Percent).ok_or(())
        } else if parse(s) == Some(0.0) {
            Ok(MarginLength::Px(0.0))
        } else {
            Err(())
        }
    }
}

/// Margin that grows (or, when negative, shrinks) the root's bounding box
/// before intersections are computed. Parsed from the CSS shorthand with one
/// to four components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: MarginLength,
    pub right: MarginLength,
    pub bottom: MarginLength,
    pub left: MarginLength,
}

impl Default for RootMargin {
    fn default() -> Self {
        Self::uniform(MarginLength::Px(0.0))
    }
}

impl RootMargin {
    pub fn uniform(length: MarginLength) -> Self {
        Self {
            top: length,
            right: length,
            bottom: length,
            left: length,
        }
    }

    /// Expand `root` by this margin.
    pub fn apply(&self, root: Rect) -> Rect {
        let top = self.top.resolve(root.height);
        let bottom = self.bottom.resolve(root.height);
        let left = self.left.resolve(root.width);
        let right = self.right.resolve(root.width);

        Rect::new(
            root.x - left,
            root.y - top,
            (root.width + left + right).max(0.0),
            (root.height + top + bottom).max(0.0),
        )
    }
}

impl FromStr for RootMargin {
    type Err = ObserverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ObserverError::InvalidRootMargin(s.to_string());

        let parts = s
            .split_whitespace()
            .map(|p| p.parse::<MarginLength>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        let (top, right, bottom, left) = match parts[..] {
            [all] => (all, all, all, all),
            [vertical, horizontal] => (vertical, horizontal, vertical, horizontal),
            [top, horizontal, bottom] => (top, horizontal, bottom, horizontal),
            [top, right, bottom, left] => (top, right, bottom, left),
            _ => return Err(invalid()),
        };

        Ok(Self {
            top,
            right,
            bottom,
            left,
        })
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}
