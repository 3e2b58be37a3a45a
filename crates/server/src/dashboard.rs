pub const DASHBOARD_HTML: &str = r###"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <meta name="theme-color" content="#081427" />
  <title>Tacmap</title>
  <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.css" crossorigin="anonymous" />
  <script src="https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.js" crossorigin="anonymous"></script>
  <style>
    :root{
      --bg:#081325;
      --ice:#e6fbff;
      --teal:#6ff8ff;
      --panel:#0b1a2dee;
      --panel-edge:#73c7ff55;
      --muted:#8aa3be;
      --ok:#4df5bf;
      --warn:#ffd06b;
      --bad:#ff7198;
      --dock-w:min(340px, 32vw);
    }
    *{box-sizing:border-box;margin:0;padding:0}
    html,body{width:100%;height:100%;overflow:hidden}
    body{font-family:Inter,system-ui,sans-serif;color:var(--ice);background:var(--bg)}
    #map{position:absolute;inset:0 var(--dock-w) 0 0}
    .dock{
      position:absolute;top:0;right:0;bottom:0;width:var(--dock-w);overflow:auto;
      padding:12px;display:flex;flex-direction:column;gap:10px;
      background:var(--panel);border-left:1px solid var(--panel-edge);
    }
    .dock h1{font-size:14px;letter-spacing:.7px}
    .dock h2{font-size:13px;margin-bottom:6px}
    .btn{
      border:1px solid #4f799f;background:#0b1b30;color:var(--ice);
      border-radius:8px;padding:5px 9px;font-weight:600;cursor:pointer;
    }
    .btn:hover{border-color:#8de7ff}
    .btn[disabled]{opacity:.5;cursor:default}
    .selector{list-style:none;margin-top:6px;display:grid;grid-template-columns:1fr 1fr;gap:4px}
    .selector .item{padding:5px 8px;border:1px solid #33506e;border-radius:6px;cursor:pointer}
    .selector .item.active{border-color:var(--teal)}
    .armed{margin-top:6px;display:flex;gap:8px;align-items:center;font-size:12px;color:var(--warn)}
    form label{display:flex;flex-direction:column;font-size:12px;color:var(--muted);margin-bottom:6px}
    form input{margin-top:2px;padding:5px;border-radius:6px;border:1px solid #33506e;background:#06101f;color:var(--ice)}
    .coord{font-size:12px;color:var(--muted);margin-bottom:6px}
    .status{font-size:12px;padding:6px;border-radius:6px;margin-bottom:6px}
    .status.ok{color:var(--ok);border:1px solid #4df5bf55}
    .status.bad{color:var(--bad);border:1px solid #ff719855}
    .field-error{font-size:11px;color:var(--bad);margin:-4px 0 6px}
    .empty{font-size:12px;color:var(--muted)}
    .entries{list-style:none;display:flex;flex-direction:column;gap:4px}
    .entries li{display:flex;gap:6px;align-items:center;font-size:12px}
    .entries li span{flex:1}
    .overlay{position:absolute;left:12px;z-index:800;pointer-events:none}
    #map\.banner{top:12px}
    #map\.hint{bottom:12px}
    .banner,.hint{padding:6px 10px;border-radius:8px;font-size:12px;background:#0b1b30dd}
    .banner{color:var(--warn);border:1px solid #ffd06b66}
    .hint{color:var(--teal);border:1px solid #6ff8ff55}
    .marker{
      width:24px;height:24px;border-radius:50%;display:flex;align-items:center;justify-content:center;
      font:700 12px/1 system-ui;color:#06101f;background:var(--teal);border:2px solid #06101f;
    }
    .mk-enemy{background:var(--bad)}
    .mk-base,.mk-location{border-radius:4px}
    .mk-delivery,.mk-mission{background:var(--warn)}
    .mk-unknown{background:#888}
  </style>
</head>
<body>
  <div id="map"></div>
  <div class="overlay" id="map.banner"></div>
  <div class="overlay" id="map.hint"></div>
  <aside class="dock">
    <h1>TACMAP</h1>
    <section id="panel.add"></section>
    <section id="panel.menu"></section>
    <section id="panel.list"></section>
  </aside>

  <script>
  (function(){
    const $ = (id) => document.getElementById(id);
    let map = null;
    let markers = null;
    let rev = null;

    async function call(method, path, body){
      const r = await fetch(path, {
        method,
        cache: "no-store",
        headers: body ? { "content-type": "application/json" } : {},
        body: body ? JSON.stringify(body) : undefined,
      });
      return r.json();
    }

    function apply(update){
      if (!update || !Array.isArray(update.patches)) return;
      for (const p of update.patches){
        const t = document.getElementById(p.target);
        if (t) t.innerHTML = p.html || "";
        if (p.trigger === "markers.refresh") loadMarkers();
      }
    }

    async function loadMarkers(){
      const view = await call("GET", "/api/map");
      markers.clearLayers();
      for (const m of view.markers){
        L.marker([m.latitude, m.longitude], {
          title: m.title,
          icon: L.divIcon({ className: "", html: m.html, iconSize: [24, 24], iconAnchor: [12, 12] }),
        }).addTo(markers);
      }
    }

    async function init(){
      const view = await call("GET", "/api/map");
      map = L.map("map", { center: [view.center.latitude, view.center.longitude], zoom: view.zoom });
      if (view.tileUrl){
        L.tileLayer(view.tileUrl, { maxZoom: 19, attribution: view.attribution }).addTo(map);
      }
      markers = L.featureGroup().addTo(map);
      map.on("click", async (e) => {
        apply(await call("POST", "/api/map/click", { latitude: e.latlng.lat, longitude: e.latlng.lng }));
      });
      apply(await call("GET", "/api/session"));
      await loadMarkers();
      pollRev();
    }

    document.addEventListener("click", async (e) => {
      const el = e.target.closest("[data-action]");
      if (!el || el.tagName === "FORM") return;
      const action = el.dataset.action;
      if (action === "placement.toggle") apply(await call("POST", "/api/placement/toggle"));
      else if (action === "placement.select") apply(await call("POST", "/api/placement/select", { objectType: el.dataset.type }));
      else if (action === "placement.cancel") apply(await call("POST", "/api/placement/cancel"));
      else if (action === "menu.cancel") apply(await call("POST", "/api/menu/cancel"));
      else if (action === "menu.edit") apply(await call("POST", "/api/menu/edit", { id: el.dataset.id }));
      else if (action === "menu.delete") apply(await call("POST", "/api/menu/delete", { id: el.dataset.id }));
    });

    document.addEventListener("submit", async (e) => {
      const form = e.target.closest("form[data-action='menu.submit']");
      if (!form) return;
      e.preventDefault();
      const values = {};
      for (const input of form.querySelectorAll("input[name]")) values[input.name] = input.value;
      apply(await call("POST", "/api/menu/submit", { values }));
    });

    async function pollRev(){
      for(;;){
        try{
          const r = await call("GET", "/api/rev");
          if (rev !== null && r.rev !== rev){
            apply(await call("GET", "/api/menu"));
            await loadMarkers();
          }
          rev = r.rev;
        }catch(_e){}
        await new Promise(res => setTimeout(res, 1500));
      }
    }

    init().catch((e) => {
      $("map.banner").innerHTML = '<div class="banner">Map failed to load.</div>';
      console.error(e);
    });
  })();
  </script>
</body>
</html>
"###;
