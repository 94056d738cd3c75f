//! Small declarative helpers shared by the workspace apps

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web as __actix_web;

/// Generates a `pub fn routes(cfg: &mut ServiceConfig)` for a route module.
///
/// `route handler` registers an actix handler, `module path::to::module`
/// pulls in that module's own `routes` function.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     module checkins,
/// }
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    (@entry $cfg:ident, route $($handler:ident)::+) => {
        $cfg.service($($handler)::+);
    };
    (@entry $cfg:ident, module $($module:ident)::+) => {
        $($module)::+::routes($cfg);
    };
    ($($kind:ident $($segment:ident)::+),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::__actix_web::web::ServiceConfig) {
            $( $crate::routes!(@entry cfg, $kind $($segment)::+); )*
        }
    };
}
