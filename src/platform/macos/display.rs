//! macOS display queries.

use crate::display::{DisplayInfo, Rect};
use crate::error::{Error, Result};
use objc2_core_graphics::{
    CGDirectDisplayID, CGDisplayBounds, CGError, CGGetActiveDisplayList, CGMainDisplayID,
};

fn display_info(display_id: CGDirectDisplayID) -> DisplayInfo {
    let bounds = CGDisplayBounds(display_id);
    DisplayInfo {
        id: display_id,
        bounds: Rect {
            x: bounds.origin.x as f64,
            y: bounds.origin.y as f64,
            width: bounds.size.width as f64,
            height: bounds.size.height as f64,
        },
        is_primary: display_id == CGMainDisplayID(),
    }
}

fn check(status: CGError) -> Result<()> {
    if status == CGError::Success {
        Ok(())
    } else {
        Err(Error::Platform(format!(
            "CGGetActiveDisplayList failed: {status:?}"
        )))
    }
}

pub fn displays() -> Result<Vec<DisplayInfo>> {
    let mut count: u32 = 0;
    check(unsafe { CGGetActiveDisplayList(0, std::ptr::null_mut(), &mut count) })?;

    let mut ids: Vec<CGDirectDisplayID> = vec![0; count as usize];
    check(unsafe { CGGetActiveDisplayList(count, ids.as_mut_ptr(), &mut count) })?;
    ids.truncate(count as usize);

    Ok(ids.into_iter().map(display_info).collect())
}
